//! The Producer API (C5): a thin facade over a `JobStore` that the HTTP
//! surface calls into. Enforces the request-shape limits the store itself
//! doesn't know about (bulk size, pagination bounds, which fields are
//! writable on update) before ever touching storage.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jobq_core::{EnqueueSpec, Job, JobFilter, JobQueueError, JobStats, JobStore, Result};
use serde::{Deserialize, Serialize};

const MAX_BULK_JOBS: usize = 100;
const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
}

/// Mutable fields a producer may update after enqueue. `status` is
/// deliberately absent: it only ever changes through claim/complete/fail/cancel.
#[derive(Debug, Deserialize, Default)]
pub struct JobUpdate {
    pub payload: Option<serde_json::Value>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub max_tries: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResult {
    pub created_jobs: Vec<Job>,
    pub total_created: usize,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn create_job(&self, spec: EnqueueSpec) -> Result<Job> {
        self.store.enqueue(spec).await
    }

    pub async fn create_jobs_bulk(&self, specs: Vec<EnqueueSpec>) -> Result<BulkCreateResult> {
        if specs.is_empty() || specs.len() > MAX_BULK_JOBS {
            return Err(JobQueueError::Validation(format!(
                "bulk request must contain between 1 and {MAX_BULK_JOBS} jobs, got {}",
                specs.len()
            )));
        }
        let created_jobs = self.store.enqueue_bulk(specs).await?;
        Ok(BulkCreateResult {
            total_created: created_jobs.len(),
            created_jobs,
        })
    }

    pub async fn list_jobs(&self, filter: JobFilter, skip: i64, limit: i64) -> Result<Vec<Job>> {
        if skip < 0 {
            return Err(JobQueueError::Validation("skip must be >= 0".to_string()));
        }
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(JobQueueError::Validation(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}, got {limit}"
            )));
        }
        self.store.list(filter, skip, limit).await
    }

    pub async fn get_job(&self, id: i64) -> Result<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))
    }

    pub async fn update_job(&self, id: i64, update: JobUpdate) -> Result<Job> {
        if let Some(max_tries) = update.max_tries {
            if max_tries < 1 {
                return Err(JobQueueError::Validation("max_tries must be at least 1".to_string()));
            }
        }
        let mut job = self.get_job(id).await?;
        if let Some(payload) = update.payload {
            job.payload = payload;
        }
        if let Some(scheduled_at) = update.scheduled_at {
            job.scheduled_at = scheduled_at;
        }
        if let Some(max_tries) = update.max_tries {
            job.max_tries = max_tries;
        }
        self.store.update(id, job.payload, job.scheduled_at, job.max_tries).await
    }

    pub async fn cancel_job(&self, id: i64) -> Result<Job> {
        self.store.cancel(id).await
    }

    pub async fn retry_job(&self, id: i64, reset_attempts: bool) -> Result<Job> {
        self.store
            .retry_failed(id, reset_attempts)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))
    }

    pub async fn job_stats(&self) -> Result<JobStats> {
        self.store.stats().await
    }

    pub async fn jobs_by_queue(&self, queue_name: &str, status: Option<jobq_core::JobStatus>, limit: i64) -> Result<Vec<Job>> {
        let filter = JobFilter {
            queue_name: Some(queue_name.to_string()),
            status,
            job_type: None,
        };
        self.list_jobs(filter, 0, limit).await
    }

    pub async fn pending_count(&self, queue_name: Option<String>) -> Result<i64> {
        self.store
            .count(JobFilter {
                queue_name,
                status: Some(jobq_core::JobStatus::Pending),
                job_type: None,
            })
            .await
    }

    pub async fn running_count(&self, queue_name: Option<String>) -> Result<i64> {
        self.store
            .count(JobFilter {
                queue_name,
                status: Some(jobq_core::JobStatus::Running),
                job_type: None,
            })
            .await
    }

    pub async fn reset_stale_jobs(&self, timeout_minutes: i64) -> Result<u64> {
        if timeout_minutes < 1 {
            return Err(JobQueueError::Validation("timeout_minutes must be at least 1".to_string()));
        }
        self.store.reset_stale(Duration::minutes(timeout_minutes)).await
    }

    pub async fn cleanup_completed_jobs(&self, older_than_days: i64) -> Result<u64> {
        if older_than_days < 1 {
            return Err(JobQueueError::Validation("older_than_days must be at least 1".to_string()));
        }
        self.store.cleanup_completed(Duration::days(older_than_days)).await
    }
}
