//! The retry policy (C3): a pure function from a just-failed job's
//! `(attempts, max_tries, retry)` to its next status and schedule.
//!
//! Kept free of any store or I/O dependency so it can be unit tested in
//! isolation and reused identically by every `JobStore` implementation.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use crate::job::JobStatus;

/// The outcome of applying the retry policy to a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    pub next_status: JobStatus,
    /// `Some` only when `next_status == Pending`.
    pub next_scheduled_at: Option<DateTime<Utc>>,
}

/// Compute the next state for a job that just failed its `attempts`-th try.
///
/// `attempts` is the count *after* the claim protocol incremented it, i.e.
/// the attempt that just ran. `retry` is false when the caller (or an
/// unknown-job-type classification) has decided the failure is permanent.
pub fn decide(attempts: i32, max_tries: i32, retry: bool) -> RetryDecision {
    if !retry {
        return RetryDecision {
            next_status: JobStatus::Failed,
            next_scheduled_at: None,
        };
    }

    if attempts < max_tries {
        let delay_minutes = 2i64.pow((attempts - 1).max(0) as u32);
        RetryDecision {
            next_status: JobStatus::Pending,
            next_scheduled_at: Some(Utc::now() + Duration::minutes(delay_minutes)),
        }
    } else {
        RetryDecision {
            next_status: JobStatus::Failed,
            next_scheduled_at: None,
        }
    }
}

/// Append `{attempt, error, timestamp}` to `payload.errors`, creating the
/// array if absent. Other payload keys are preserved.
pub fn append_error(payload: &mut Value, attempt: i32, error: &str) {
    let obj = payload.as_object_mut().expect("job payload must be a JSON object");
    let errors = obj.entry("errors").or_insert_with(|| json!([]));
    if let Some(arr) = errors.as_array_mut() {
        arr.push(json!({
            "attempt": attempt,
            "error": error,
            "timestamp": Utc::now().to_rfc3339(),
        }));
    }
}

/// Write `result` into `payload.result`, preserving the original keys.
pub fn apply_result(payload: &mut Value, result: Value) {
    let obj = payload.as_object_mut().expect("job payload must be a JSON object");
    obj.insert("result".to_string(), result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_failure_goes_straight_to_failed() {
        let decision = decide(1, 3, false);
        assert_eq!(decision.next_status, JobStatus::Failed);
        assert!(decision.next_scheduled_at.is_none());
    }

    #[test]
    fn retryable_failure_schedules_geometric_backoff() {
        let before = Utc::now();
        let decision = decide(1, 3, true);
        assert_eq!(decision.next_status, JobStatus::Pending);
        let scheduled = decision.next_scheduled_at.unwrap();
        assert!(scheduled - before >= Duration::seconds(59));
        assert!(scheduled - before <= Duration::minutes(1) + Duration::seconds(5));
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let before = Utc::now();
        let d2 = decide(2, 5, true).next_scheduled_at.unwrap();
        let d3 = decide(3, 5, true).next_scheduled_at.unwrap();
        assert!(d2 - before >= Duration::minutes(2) - Duration::seconds(2));
        assert!(d3 - before >= Duration::minutes(4) - Duration::seconds(2));
    }

    #[test]
    fn exhausted_retries_fail_permanently() {
        let decision = decide(3, 3, true);
        assert_eq!(decision.next_status, JobStatus::Failed);
        assert!(decision.next_scheduled_at.is_none());
    }

    #[test]
    fn append_error_preserves_existing_keys() {
        let mut payload = json!({"to": "a@b"});
        append_error(&mut payload, 1, "boom");
        append_error(&mut payload, 2, "boom again");
        assert_eq!(payload["to"], "a@b");
        assert_eq!(payload["errors"].as_array().unwrap().len(), 2);
        assert_eq!(payload["errors"][0]["attempt"], 1);
        assert_eq!(payload["errors"][1]["error"], "boom again");
    }

    #[test]
    fn apply_result_preserves_existing_keys() {
        let mut payload = json!({"to": "a@b"});
        apply_result(&mut payload, json!({"status": "sent"}));
        assert_eq!(payload["to"], "a@b");
        assert_eq!(payload["result"]["status"], "sent");
    }
}
