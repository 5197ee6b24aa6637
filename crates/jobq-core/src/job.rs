//! The job model: the single entity the rest of the queue operates on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Job`].
///
/// Progression is monotonic: `Pending -> Running -> {Completed | Failed | Pending}`.
/// `Cancelled` is terminal and reachable only from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: '{other}'")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The default queue name used when a producer doesn't specify one.
pub const DEFAULT_QUEUE: &str = "default";

/// A durable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub queue_name: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub scheduled_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_tries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input to [`crate::store::JobStore::enqueue`] and the bulk equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueSpec {
    pub job_type: String,
    pub payload: serde_json::Value,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default = "default_max_tries")]
    pub max_tries: i32,
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_max_tries() -> i32 {
    3
}

/// Every payload the store ever writes to `payload.errors`/`payload.result`
/// assumes a JSON object underneath. Reject anything else at the boundary
/// (enqueue, bulk enqueue, update) rather than panicking deep in a worker
/// task the first time a completion or failure is recorded.
pub fn validate_payload(payload: &serde_json::Value) -> crate::error::Result<()> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(crate::error::JobQueueError::Validation(
            "payload must be a JSON object".to_string(),
        ))
    }
}

/// Filter applied by [`crate::store::JobStore::list`] and `count`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub queue_name: Option<String>,
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
}

/// Aggregate counters returned by [`crate::store::JobStore::stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub pending_count: i64,
    pub running_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub cancelled_count: i64,
    pub queue_counts: std::collections::HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_payload_accepts_objects_only() {
        assert!(validate_payload(&serde_json::json!({"to": "a@b"})).is_ok());
        assert!(validate_payload(&serde_json::json!([1, 2, 3])).is_err());
        assert!(validate_payload(&serde_json::json!("not an object")).is_err());
    }
}
