//! An in-memory `JobStore`, for exercising the worker runtime and producer
//! API without a live Postgres instance. Claim exclusivity and ordering
//! match the Postgres implementation exactly; only the storage medium
//! differs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jobq_core::job::{EnqueueSpec, Job, JobFilter, JobStats, JobStatus};
use jobq_core::store::JobStore;
use jobq_core::{retry, validate_payload, JobQueueError, Result};
use tokio::sync::Mutex;

/// In-memory `JobStore` backed by a single mutex. Good enough to race many
/// concurrent claimers against, since the mutex is the only thing standing
/// in for a database row lock.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<i64, Job>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn insert(&self, jobs: &mut HashMap<i64, Job>, spec: EnqueueSpec) -> Job {
        let now = Utc::now();
        let job = Job {
            id: self.alloc_id(),
            queue_name: spec.queue_name,
            job_type: spec.job_type,
            payload: spec.payload,
            status: JobStatus::Pending,
            scheduled_at: spec.scheduled_at.unwrap_or(now),
            attempts: 0,
            max_tries: spec.max_tries,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        };
        jobs.insert(job.id, job.clone());
        job
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, spec: EnqueueSpec) -> Result<Job> {
        if spec.max_tries < 1 {
            return Err(JobQueueError::Validation("max_tries must be at least 1".to_string()));
        }
        validate_payload(&spec.payload)?;
        let mut jobs = self.jobs.lock().await;
        Ok(self.insert(&mut jobs, spec))
    }

    async fn enqueue_bulk(&self, specs: Vec<EnqueueSpec>) -> Result<Vec<Job>> {
        for spec in &specs {
            if spec.max_tries < 1 {
                return Err(JobQueueError::Validation("max_tries must be at least 1".to_string()));
            }
            validate_payload(&spec.payload)?;
        }
        let mut jobs = self.jobs.lock().await;
        Ok(specs.into_iter().map(|spec| self.insert(&mut jobs, spec)).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Job>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(&id).filter(|j| !j.is_deleted).cloned())
    }

    async fn list(&self, filter: JobFilter, skip: i64, limit: i64) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| !j.is_deleted)
            .filter(|j| filter.queue_name.as_deref().map_or(true, |q| q == j.queue_name))
            .filter(|j| filter.status.map_or(true, |s| s == j.status))
            .filter(|j| filter.job_type.as_deref().map_or(true, |t| t == j.job_type))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));
        let skip = skip.max(0) as usize;
        let limit = limit.max(0) as usize;
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, filter: JobFilter) -> Result<i64> {
        Ok(self.list(filter, 0, i64::MAX).await?.len() as i64)
    }

    async fn stats(&self) -> Result<JobStats> {
        let jobs = self.jobs.lock().await;
        let mut stats = JobStats::default();
        for job in jobs.values().filter(|j| !j.is_deleted) {
            match job.status {
                JobStatus::Pending => stats.pending_count += 1,
                JobStatus::Running => stats.running_count += 1,
                JobStatus::Completed => stats.completed_count += 1,
                JobStatus::Failed => stats.failed_count += 1,
                JobStatus::Cancelled => stats.cancelled_count += 1,
            }
            *stats.queue_counts.entry(job.queue_name.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn claim_next(&self, queue_names: &[String], _worker_id: &str) -> Result<Option<Job>> {
        if queue_names.is_empty() {
            return Ok(None);
        }
        let now = Utc::now();
        let mut jobs = self.jobs.lock().await;

        let candidate_id = jobs
            .values()
            .filter(|j| !j.is_deleted)
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| queue_names.iter().any(|q| q == &j.queue_name))
            .filter(|j| j.scheduled_at <= now)
            .min_by_key(|j| (j.scheduled_at, j.id))
            .map(|j| j.id);

        let Some(id) = candidate_id else { return Ok(None) };
        let job = jobs.get_mut(&id).expect("candidate id came from this map");
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, id: i64, result: serde_json::Value) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;
        retry::apply_result(&mut job.payload, result);
        job.status = JobStatus::Completed;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error_message: &str, retry_allowed: bool) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;

        retry::append_error(&mut job.payload, job.attempts, error_message);
        let decision = retry::decide(job.attempts, job.max_tries, retry_allowed);
        job.status = decision.next_status;
        if let Some(scheduled_at) = decision.next_scheduled_at {
            job.scheduled_at = scheduled_at;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update(&self, id: i64, payload: serde_json::Value, scheduled_at: chrono::DateTime<Utc>, max_tries: i32) -> Result<Job> {
        if max_tries < 1 {
            return Err(JobQueueError::Validation("max_tries must be at least 1".to_string()));
        }
        validate_payload(&payload)?;
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;
        job.payload = payload;
        job.scheduled_at = scheduled_at;
        job.max_tries = max_tries;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn cancel(&self, id: i64) -> Result<Job> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;

        if job.status != JobStatus::Pending {
            return Err(JobQueueError::InvalidState(format!(
                "cannot cancel job with status '{}'; only pending jobs can be cancelled",
                job.status
            )));
        }

        job.status = JobStatus::Cancelled;
        job.is_deleted = true;
        job.deleted_at = Some(Utc::now());
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn reset_stale(&self, timeout: Duration) -> Result<u64> {
        let cutoff = Utc::now() - timeout;
        let mut jobs = self.jobs.lock().await;
        let mut count = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Running && job.updated_at < cutoff {
                job.status = JobStatus::Pending;
                job.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn cleanup_completed(&self, age: Duration) -> Result<u64> {
        let cutoff = Utc::now() - age;
        let mut jobs = self.jobs.lock().await;
        let to_remove: Vec<i64> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Completed && j.updated_at < cutoff)
            .map(|j| j.id)
            .collect();
        for id in &to_remove {
            jobs.remove(id);
        }
        Ok(to_remove.len() as u64)
    }

    async fn retry_failed(&self, id: i64, reset_attempts: bool) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&id) else { return Ok(None) };
        if job.status != JobStatus::Failed {
            return Ok(None);
        }
        job.status = JobStatus::Pending;
        job.scheduled_at = Utc::now();
        if reset_attempts {
            job.attempts = 0;
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }
}
