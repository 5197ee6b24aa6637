//! The worker runtime (C4): a single-process, cooperatively-scheduled
//! concurrent job executor. See the module-level docs in `lib.rs` for the
//! main-loop shape this implements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jobq_core::{HandlerRegistry, Job, JobStore};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::WorkerConfig;

/// How a single claimed job's background execution finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Succeeded,
    Failed,
}

/// Final counters logged on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// How long `start()` waits for in-flight jobs to finish after shutdown is
/// requested, before forcefully cancelling them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// A concurrent job executor bound to one store, one handler registry, and
/// one set of queues.
pub struct WorkerRuntime {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl WorkerRuntime {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self {
            store,
            registry,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle the caller can flip (e.g. from a signal handler) to request
    /// a graceful shutdown after the current loop iteration.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the main poll loop until `shutdown_handle()` is set, then drain
    /// in-flight jobs and return final statistics. Never returns early on a
    /// transient store error — the loop is the ultimate catch boundary.
    pub async fn start(&self) -> WorkerStats {
        tracing::info!(
            worker_id = %self.config.worker_id,
            queues = ?self.config.queues,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "worker starting"
        );

        let mut active: Vec<JoinHandle<JobOutcome>> = Vec::new();
        let mut current_poll_interval = self.config.poll_interval;
        let mut stats = WorkerStats::default();

        while !self.shutdown.load(Ordering::SeqCst) {
            reap_finished(&mut active, &mut stats).await;

            let available = self.config.max_concurrent_jobs.saturating_sub(active.len());
            if available == 0 {
                sleep(self.config.poll_interval).await;
                continue;
            }

            match self.store.claim_next(&self.config.queues, &self.config.worker_id).await {
                Ok(Some(job)) => {
                    tracing::info!(job_id = job.id, job_type = %job.job_type, queue_name = %job.queue_name, "job claimed");
                    active.push(self.spawn_execution(job));
                    current_poll_interval = self.config.poll_interval;
                }
                Ok(None) => {
                    if active.is_empty() {
                        sleep(current_poll_interval).await;
                        current_poll_interval = current_poll_interval
                            .mul_f64(self.config.backoff_factor)
                            .min(self.config.max_poll_interval);
                    } else {
                        sleep(self.config.poll_interval).await;
                    }
                }
                Err(error) => {
                    tracing::error!(%error, "error polling for work, retrying next tick");
                    sleep(self.config.poll_interval).await;
                }
            }
        }

        tracing::warn!(active = active.len(), "shutdown requested, draining in-flight jobs");
        drain(active, SHUTDOWN_GRACE, &mut stats).await;

        tracing::info!(
            worker_id = %self.config.worker_id,
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "worker stopped"
        );
        stats
    }

    fn spawn_execution(&self, job: Job) -> JoinHandle<JobOutcome> {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let worker_id = self.config.worker_id.clone();
        tokio::spawn(async move { execute_claimed_job(store, registry, worker_id, job.id).await })
    }
}

/// Remove finished handles from `active`, folding their outcome into `stats`.
/// An already-finished `JoinHandle` resolves immediately, so awaiting it here
/// never suspends the poll loop.
async fn reap_finished(active: &mut Vec<JoinHandle<JobOutcome>>, stats: &mut WorkerStats) {
    let mut remaining = Vec::with_capacity(active.len());
    for handle in active.drain(..) {
        if handle.is_finished() {
            record_outcome(handle.await, stats);
        } else {
            remaining.push(handle);
        }
    }
    *active = remaining;
}

fn record_outcome(outcome: Result<JobOutcome, tokio::task::JoinError>, stats: &mut WorkerStats) {
    stats.processed += 1;
    match outcome {
        Ok(JobOutcome::Succeeded) => stats.succeeded += 1,
        Ok(JobOutcome::Failed) => stats.failed += 1,
        Err(error) => {
            tracing::error!(%error, "job task panicked or was cancelled before finishing");
            stats.failed += 1;
        }
    }
}

/// Wait up to `grace` for `active` to finish, polling at a short interval;
/// anything still running after that is aborted and counted as failed.
async fn drain(mut active: Vec<JoinHandle<JobOutcome>>, grace: Duration, stats: &mut WorkerStats) {
    let deadline = Instant::now() + grace;

    while !active.is_empty() && Instant::now() < deadline {
        let mut remaining = Vec::with_capacity(active.len());
        for handle in active.drain(..) {
            if handle.is_finished() {
                record_outcome(handle.await, stats);
            } else {
                remaining.push(handle);
            }
        }
        active = remaining;
        if !active.is_empty() {
            sleep(Duration::from_millis(200)).await;
        }
    }

    if !active.is_empty() {
        tracing::warn!(remaining = active.len(), "grace period elapsed, cancelling remaining jobs");
        for handle in active {
            handle.abort();
            stats.processed += 1;
            stats.failed += 1;
        }
    }
}

/// Per-job execution (runs as its own task): reload the job fresh from the
/// store, dispatch to its handler, and record the outcome.
async fn execute_claimed_job(
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    worker_id: String,
    job_id: i64,
) -> JobOutcome {
    let start = Instant::now();

    let job = match store.get(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(job_id, "claimed job disappeared before execution");
            return JobOutcome::Failed;
        }
        Err(error) => {
            tracing::error!(job_id, %error, "failed to reload claimed job");
            return JobOutcome::Failed;
        }
    };

    let handler = match registry.get(&job.job_type) {
        Some(handler) => handler,
        None => {
            tracing::error!(job_id, job_type = %job.job_type, "unknown job type");
            let message = format!("Invalid job type: '{}'", job.job_type);
            if let Err(error) = store.mark_failed(job_id, &message, false).await {
                tracing::error!(job_id, %error, "failed to record unknown-job-type failure");
            }
            return JobOutcome::Failed;
        }
    };

    tracing::info!(job_id, job_type = %job.job_type, %worker_id, "executing job");

    match handler.execute(&job.payload).await {
        Ok(result) => match store.mark_completed(job_id, result).await {
            Ok(()) => {
                tracing::info!(job_id, duration_ms = start.elapsed().as_millis(), "job completed");
                JobOutcome::Succeeded
            }
            Err(error) => {
                tracing::error!(job_id, %error, "failed to record completion");
                JobOutcome::Failed
            }
        },
        Err(error) => {
            let message = error.to_string();
            if let Err(store_error) = store.mark_failed(job_id, &message, true).await {
                tracing::error!(job_id, %store_error, "failed to record failure");
            }
            tracing::warn!(
                job_id,
                duration_ms = start.elapsed().as_millis(),
                error = %message,
                "job failed"
            );
            JobOutcome::Failed
        }
    }
}
