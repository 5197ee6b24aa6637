//! The handler registry (C2): a process-wide, read-only-after-startup
//! mapping from `job_type` to the handler that executes it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// A handler for one `job_type`. Implementations do their own typed decoding
/// of `payload`; the registry only ever sees it as an opaque JSON value.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The `job_type` string this handler claims.
    fn job_type(&self) -> &str;

    /// Run the job. Any `Err` is treated as a retryable handler error.
    async fn execute(&self, payload: &Value) -> anyhow::Result<Value>;
}

/// Startup-time, read-only-thereafter map from `job_type` to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, keyed by its own `job_type()`.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type().to_string(), handler);
    }

    /// Look up a handler. `None` is the "unknown job type" case the worker
    /// runtime treats as a permanent failure.
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// The set of registered job types, for diagnostics.
    pub fn job_types(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        fn job_type(&self) -> &str {
            "echo"
        }

        async fn execute(&self, payload: &Value) -> anyhow::Result<Value> {
            Ok(payload.clone())
        }
    }

    #[tokio::test]
    async fn registers_and_looks_up_by_job_type() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Echo));

        let handler = registry.get("echo").expect("handler registered");
        let result = handler.execute(&json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));

        assert!(registry.get("nope").is_none());
    }
}
