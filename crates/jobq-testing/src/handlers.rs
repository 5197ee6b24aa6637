//! Deterministic handlers used to exercise the retry policy end to end
//! without depending on any real side-effecting integration.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use jobq_core::handler::JobHandler;
use serde_json::{json, Value};

/// Always succeeds, echoing `{"status": "sent"}` as its result.
pub struct AlwaysSucceedHandler {
    job_type: String,
}

impl AlwaysSucceedHandler {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self { job_type: job_type.into() }
    }
}

#[async_trait]
impl JobHandler for AlwaysSucceedHandler {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, _payload: &Value) -> anyhow::Result<Value> {
        Ok(json!({"status": "sent"}))
    }
}

/// Always fails with a fixed message, for exercising the retry/backoff path.
pub struct AlwaysFailHandler {
    job_type: String,
    message: String,
}

impl AlwaysFailHandler {
    pub fn new(job_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl JobHandler for AlwaysFailHandler {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, _payload: &Value) -> anyhow::Result<Value> {
        anyhow::bail!(self.message.clone())
    }
}

/// Fails the first `n` times it's invoked, then succeeds. Useful for
/// asserting a job recovers within its `max_tries` budget.
pub struct FailNTimesThenSucceedHandler {
    job_type: String,
    remaining_failures: AtomicU32,
}

impl FailNTimesThenSucceedHandler {
    pub fn new(job_type: impl Into<String>, n: u32) -> Self {
        Self {
            job_type: job_type.into(),
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl JobHandler for FailNTimesThenSucceedHandler {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    async fn execute(&self, _payload: &Value) -> anyhow::Result<Value> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("transient failure, {remaining} remaining");
        }
        Ok(json!({"status": "sent"}))
    }
}
