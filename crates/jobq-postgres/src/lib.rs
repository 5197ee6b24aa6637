//! PostgreSQL implementation of the jobq durable job store.
//!
//! This crate provides the production backend for the `JobStore` trait from
//! `jobq-core`.
//!
//! # Features
//!
//! - Contention-free claiming via `FOR UPDATE SKIP LOCKED`
//! - Exponential backoff retry scheduling (delegated to `jobq_core::retry`)
//! - Soft-delete on cancel, hard-delete on cleanup
//! - Stale-job recovery for crashed workers
//!
//! # Database Schema
//!
//! See `migrations/0001_create_jobs.sql` for the canonical schema; the
//! gist of it:
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id BIGSERIAL PRIMARY KEY,
//!     queue_name TEXT NOT NULL DEFAULT 'default',
//!     job_type TEXT NOT NULL,
//!     payload JSONB NOT NULL,
//!     status TEXT NOT NULL DEFAULT 'pending',
//!     scheduled_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     attempts INTEGER NOT NULL DEFAULT 0,
//!     max_tries INTEGER NOT NULL DEFAULT 3,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
//!     deleted_at TIMESTAMPTZ
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use jobq_postgres::PgJobStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/jobq").await?;
//! let store = PgJobStore::new(pool);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobq_core::job::{EnqueueSpec, Job, JobFilter, JobStats, JobStatus};
use jobq_core::store::JobStore;
use jobq_core::{retry, validate_payload, JobQueueError, Result};
use sqlx::{PgPool, QueryBuilder, Row};
use std::collections::HashMap;

/// PostgreSQL-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool, for callers that need to share it
    /// (e.g. the HTTP surface's health checks).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations. Called once at process startup by
    /// both the `server` and `worker` binaries.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> std::result::Result<Job, sqlx::Error> {
        let status_str: String = row.try_get("status")?;
        Ok(Job {
            id: row.try_get("id")?,
            queue_name: row.try_get("queue_name")?,
            job_type: row.try_get("job_type")?,
            payload: row.try_get("payload")?,
            status: status_str.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: e.into(),
            })?,
            scheduled_at: row.try_get("scheduled_at")?,
            attempts: row.try_get("attempts")?,
            max_tries: row.try_get("max_tries")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    async fn fetch_job(&self, id: i64) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;
        Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, spec: EnqueueSpec) -> Result<Job> {
        if spec.max_tries < 1 {
            return Err(JobQueueError::Validation(
                "max_tries must be at least 1".to_string(),
            ));
        }
        validate_payload(&spec.payload)?;

        let scheduled_at = spec.scheduled_at.unwrap_or_else(Utc::now);

        let row = sqlx::query(
            r#"
            INSERT INTO jobs (queue_name, job_type, payload, scheduled_at, max_tries)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&spec.queue_name)
        .bind(&spec.job_type)
        .bind(&spec.payload)
        .bind(scheduled_at)
        .bind(spec.max_tries)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn enqueue_bulk(&self, specs: Vec<EnqueueSpec>) -> Result<Vec<Job>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        for spec in &specs {
            if spec.max_tries < 1 {
                return Err(JobQueueError::Validation(
                    "max_tries must be at least 1".to_string(),
                ));
            }
            validate_payload(&spec.payload)?;
        }

        let mut tx = self.pool.begin().await.map_err(|e| JobQueueError::Store(e.into()))?;

        let mut jobs = Vec::with_capacity(specs.len());
        for spec in specs {
            let scheduled_at = spec.scheduled_at.unwrap_or_else(Utc::now);
            let row = sqlx::query(
                r#"
                INSERT INTO jobs (queue_name, job_type, payload, scheduled_at, max_tries)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(&spec.queue_name)
            .bind(&spec.job_type)
            .bind(&spec.payload)
            .bind(scheduled_at)
            .bind(spec.max_tries)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

            jobs.push(Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))?);
        }

        tx.commit().await.map_err(|e| JobQueueError::Store(e.into()))?;
        Ok(jobs)
    }

    async fn get(&self, id: i64) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

        row.as_ref()
            .map(Self::row_to_job)
            .transpose()
            .map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn list(&self, filter: JobFilter, skip: i64, limit: i64) -> Result<Vec<Job>> {
        let mut qb = QueryBuilder::new("SELECT * FROM jobs WHERE is_deleted = FALSE");
        push_filter(&mut qb, &filter);
        qb.push(" ORDER BY id DESC OFFSET ");
        qb.push_bind(skip);
        qb.push(" LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

        rows.iter()
            .map(Self::row_to_job)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn count(&self, filter: JobFilter) -> Result<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) as n FROM jobs WHERE is_deleted = FALSE");
        push_filter(&mut qb, &filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

        row.try_get::<i64, _>("n").map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn stats(&self) -> Result<JobStats> {
        let status_row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') as cancelled
            FROM jobs
            WHERE is_deleted = FALSE
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        let queue_rows = sqlx::query(
            "SELECT queue_name, COUNT(*) as n FROM jobs WHERE is_deleted = FALSE GROUP BY queue_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        let mut queue_counts = HashMap::new();
        for row in queue_rows {
            let name: String = row.try_get("queue_name").map_err(|e| JobQueueError::Store(e.into()))?;
            let n: i64 = row.try_get("n").map_err(|e| JobQueueError::Store(e.into()))?;
            queue_counts.insert(name, n);
        }

        Ok(JobStats {
            pending_count: status_row.try_get("pending").map_err(|e| JobQueueError::Store(e.into()))?,
            running_count: status_row.try_get("running").map_err(|e| JobQueueError::Store(e.into()))?,
            completed_count: status_row.try_get("completed").map_err(|e| JobQueueError::Store(e.into()))?,
            failed_count: status_row.try_get("failed").map_err(|e| JobQueueError::Store(e.into()))?,
            cancelled_count: status_row.try_get("cancelled").map_err(|e| JobQueueError::Store(e.into()))?,
            queue_counts,
        })
    }

    /// The claim protocol. A single statement selects the smallest
    /// `(scheduled_at, id)` among eligible rows, locking it with
    /// `FOR UPDATE SKIP LOCKED` so concurrent pollers never block on each
    /// other or observe the same row, then flips it to `running` and bumps
    /// `attempts` in the same statement.
    async fn claim_next(&self, queue_names: &[String], worker_id: &str) -> Result<Option<Job>> {
        if queue_names.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running',
                attempts = attempts + 1,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                  AND queue_name = ANY($1)
                  AND scheduled_at <= NOW()
                  AND is_deleted = FALSE
                ORDER BY scheduled_at ASC, id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(queue_names)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job = Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))?;

        tracing::debug!(job_id = job.id, job_type = %job.job_type, worker_id, "job claimed");
        Ok(Some(job))
    }

    async fn mark_completed(&self, id: i64, result: serde_json::Value) -> Result<()> {
        let job = self.fetch_job(id).await?;
        let mut payload = job.payload;
        retry::apply_result(&mut payload, result);

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', payload = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(payload)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        Ok(())
    }

    async fn mark_failed(&self, id: i64, error_message: &str, retry_allowed: bool) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| JobQueueError::Store(e.into()))?;

        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;
        let job = Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))?;

        let mut payload = job.payload;
        retry::append_error(&mut payload, job.attempts, error_message);

        let decision = retry::decide(job.attempts, job.max_tries, retry_allowed);

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, scheduled_at = COALESCE($2, scheduled_at), payload = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(decision.next_status.as_str())
        .bind(decision.next_scheduled_at)
        .bind(payload)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        tx.commit().await.map_err(|e| JobQueueError::Store(e.into()))?;
        Ok(())
    }

    async fn update(&self, id: i64, payload: serde_json::Value, scheduled_at: DateTime<Utc>, max_tries: i32) -> Result<Job> {
        if max_tries < 1 {
            return Err(JobQueueError::Validation("max_tries must be at least 1".to_string()));
        }
        validate_payload(&payload)?;

        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET payload = $1, scheduled_at = $2, max_tries = $3, updated_at = NOW()
            WHERE id = $4 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(payload)
        .bind(scheduled_at)
        .bind(max_tries)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?
        .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;

        Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn cancel(&self, id: i64) -> Result<Job> {
        let mut tx = self.pool.begin().await.map_err(|e| JobQueueError::Store(e.into()))?;

        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))?;
        let job = Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))?;

        // Not `AND is_deleted = FALSE`: a second cancel of an
        // already-cancelled job must see the row and fail with
        // `InvalidState`, not with `NotFound`.
        if job.status != JobStatus::Pending {
            return Err(JobQueueError::InvalidState(format!(
                "cannot cancel job with status '{}'; only pending jobs can be cancelled",
                job.status
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled', is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        tx.commit().await.map_err(|e| JobQueueError::Store(e.into()))?;
        Self::row_to_job(&updated).map_err(|e| JobQueueError::Store(e.into()))
    }

    async fn reset_stale(&self, timeout: Duration) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - timeout;

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', updated_at = NOW()
            WHERE status = 'running' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| JobQueueError::Store(e.into()))?;

        Ok(result.rows_affected())
    }

    async fn cleanup_completed(&self, age: Duration) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - age;

        let result = sqlx::query("DELETE FROM jobs WHERE status = 'completed' AND updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

        Ok(result.rows_affected())
    }

    async fn retry_failed(&self, id: i64, reset_attempts: bool) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await.map_err(|e| JobQueueError::Store(e.into()))?;

        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| JobQueueError::Store(e.into()))?;

        let Some(row) = row else { return Ok(None) };
        let job = Self::row_to_job(&row).map_err(|e| JobQueueError::Store(e.into()))?;

        if job.status != JobStatus::Failed {
            return Ok(None);
        }

        let updated = if reset_attempts {
            sqlx::query(
                "UPDATE jobs SET status = 'pending', scheduled_at = NOW(), attempts = 0, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await
        } else {
            sqlx::query(
                "UPDATE jobs SET status = 'pending', scheduled_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await
        }
        .map_err(|e| JobQueueError::Store(e.into()))?;

        tx.commit().await.map_err(|e| JobQueueError::Store(e.into()))?;
        Ok(Some(Self::row_to_job(&updated).map_err(|e| JobQueueError::Store(e.into()))?))
    }
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, sqlx::Postgres>, filter: &'a JobFilter) {
    if let Some(queue_name) = &filter.queue_name {
        qb.push(" AND queue_name = ").push_bind(queue_name);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(job_type) = &filter.job_type {
        qb.push(" AND job_type = ").push_bind(job_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clause_is_empty_when_no_filter_set() {
        let mut qb = QueryBuilder::new("SELECT * FROM jobs WHERE is_deleted = FALSE");
        push_filter(&mut qb, &JobFilter::default());
        assert_eq!(qb.sql(), "SELECT * FROM jobs WHERE is_deleted = FALSE");
    }
}
