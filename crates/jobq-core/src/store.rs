//! The `JobStore` trait: the one seam every durable backend implements.
//!
//! The critical operation is [`JobStore::claim_next`] — the atomic,
//! contention-free `pending -> running` transition described in the spec's
//! claim protocol. Every other method is bulk housekeeping around it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::job::{EnqueueSpec, Job, JobFilter, JobStats};

/// Durable persistence of jobs, and the claim protocol that hands them to workers.
///
/// Implementations must preserve, regardless of backend:
/// - at most one claimant observes a given row per `claim_next` call across
///   any number of concurrent callers (claim exclusivity);
/// - claim order within a queue is `(scheduled_at, id)` ascending;
/// - soft-deleted rows are invisible to every method here.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a single job with `status = pending`, `attempts = 0`.
    async fn enqueue(&self, spec: EnqueueSpec) -> Result<Job>;

    /// Insert many jobs in one transaction; all succeed or none do.
    async fn enqueue_bulk(&self, specs: Vec<EnqueueSpec>) -> Result<Vec<Job>>;

    /// Fetch a single job by id, ignoring soft-deleted rows.
    async fn get(&self, id: i64) -> Result<Option<Job>>;

    /// List jobs matching `filter`, newest-first, with `(skip, limit)` pagination.
    async fn list(&self, filter: JobFilter, skip: i64, limit: i64) -> Result<Vec<Job>>;

    /// Count jobs matching `filter`.
    async fn count(&self, filter: JobFilter) -> Result<i64>;

    /// Per-status and per-queue counts across all non-deleted jobs.
    async fn stats(&self) -> Result<JobStats>;

    /// The claim protocol: atomically select and claim the next eligible job
    /// across `queue_names`, or `None` if there isn't one yet.
    async fn claim_next(&self, queue_names: &[String], worker_id: &str) -> Result<Option<Job>>;

    /// Record a successful execution. `result` is merged into `payload.result`.
    async fn mark_completed(&self, id: i64, result: serde_json::Value) -> Result<()>;

    /// Record a failed execution. When `retry` is true and attempts remain,
    /// the retry policy (see [`crate::retry`]) computes the next schedule;
    /// otherwise the job moves to `failed`.
    async fn mark_failed(&self, id: i64, error_message: &str, retry: bool) -> Result<()>;

    /// Overwrite a job's mutable fields (`payload`, `scheduled_at`,
    /// `max_tries`). Status is never touched here; that only ever changes
    /// through claim/complete/fail/cancel.
    async fn update(
        &self,
        id: i64,
        payload: serde_json::Value,
        scheduled_at: DateTime<Utc>,
        max_tries: i32,
    ) -> Result<Job>;

    /// Cancel a `pending` job: `status = cancelled`, soft-deleted. Errors
    /// (as `InvalidState`) if the job isn't `pending`.
    async fn cancel(&self, id: i64) -> Result<Job>;

    /// Revert `running` jobs whose `updated_at` predates `now - timeout` back
    /// to `pending`, without touching `attempts`. Returns the count reset.
    async fn reset_stale(&self, timeout: Duration) -> Result<u64>;

    /// Hard-delete `completed` jobs whose `updated_at` predates `now - age`.
    /// Returns the count deleted.
    async fn cleanup_completed(&self, age: Duration) -> Result<u64>;

    /// Manually move a `failed` job back to `pending`, optionally zeroing
    /// `attempts`. Returns `None` if the job isn't `failed`.
    async fn retry_failed(&self, id: i64, reset_attempts: bool) -> Result<Option<Job>>;
}

/// Convenience used by implementations and tests: "now" as seen by the store.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
