//! End-to-end exercises of the worker runtime against the in-memory store.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use jobq_core::{EnqueueSpec, HandlerRegistry, JobStatus, JobStore};
use jobq_testing::{AlwaysFailHandler, AlwaysSucceedHandler, InMemoryJobStore};
use jobq_worker::{WorkerConfig, WorkerRuntime};
use serde_json::json;

fn fast_config(queues: &[&str], max_concurrent_jobs: usize) -> WorkerConfig {
    WorkerConfig {
        worker_id: "test-worker".to_string(),
        queues: queues.iter().map(|s| s.to_string()).collect(),
        poll_interval: Duration::from_millis(10),
        max_poll_interval: Duration::from_millis(50),
        backoff_factor: 1.5,
        max_concurrent_jobs,
    }
}

/// S1 — happy path: pending -> running -> completed, attempts = 1, result recorded.
#[tokio::test(flavor = "multi_thread")]
async fn completes_a_job_successfully() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(AlwaysSucceedHandler::new("emails")));

    let job = store
        .enqueue(EnqueueSpec {
            job_type: "emails".to_string(),
            payload: json!({"to": "a@b"}),
            queue_name: "default".to_string(),
            scheduled_at: None,
            max_tries: 3,
        })
        .await
        .unwrap();

    let runtime = WorkerRuntime::new(store.clone(), Arc::new(registry), fast_config(&["default"], 1));
    let shutdown = runtime.shutdown_handle();
    let handle = tokio::spawn(async move { runtime.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.store(true, Ordering::SeqCst);
    let stats = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

    let completed = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.attempts, 1);
    assert_eq!(completed.payload["result"]["status"], "sent");
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
}

/// S6 — unknown job type: exactly one attempt, permanent failure, no backoff retry.
#[tokio::test(flavor = "multi_thread")]
async fn unknown_job_type_fails_permanently() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let registry = HandlerRegistry::new(); // nothing registered

    let job = store
        .enqueue(EnqueueSpec {
            job_type: "nope".to_string(),
            payload: json!({}),
            queue_name: "default".to_string(),
            scheduled_at: None,
            max_tries: 3,
        })
        .await
        .unwrap();

    let runtime = WorkerRuntime::new(store.clone(), Arc::new(registry), fast_config(&["default"], 1));
    let shutdown = runtime.shutdown_handle();
    let handle = tokio::spawn(async move { runtime.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.store(true, Ordering::SeqCst);
    tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

    let failed = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed.payload["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains("Invalid job type"));
}

/// A handler that always fails permanently moves a job to `failed` on the
/// first attempt with no scheduled retry, mirroring `retry = false` callers.
#[tokio::test(flavor = "multi_thread")]
async fn permanent_handler_failure_has_no_retry() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(AlwaysFailHandler::new("reports", "boom")));

    let job = store
        .enqueue(EnqueueSpec {
            job_type: "reports".to_string(),
            payload: json!({}),
            queue_name: "default".to_string(),
            scheduled_at: None,
            max_tries: 1,
        })
        .await
        .unwrap();

    let runtime = WorkerRuntime::new(store.clone(), Arc::new(registry), fast_config(&["default"], 1));
    let shutdown = runtime.shutdown_handle();
    let handle = tokio::spawn(async move { runtime.start().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.store(true, Ordering::SeqCst);
    tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

    let result = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.payload["errors"].as_array().unwrap().len(), 1);
}

/// S3 — claim exclusivity: two runtimes sharing a store never double-process
/// the same job, and every job is eventually completed exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn two_workers_never_double_claim() {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    const N: usize = 40;

    for _ in 0..N {
        store
            .enqueue(EnqueueSpec {
                job_type: "emails".to_string(),
                payload: json!({}),
                queue_name: "default".to_string(),
                scheduled_at: None,
                max_tries: 1,
            })
            .await
            .unwrap();
    }

    let mut registry_a = HandlerRegistry::new();
    registry_a.register(Arc::new(AlwaysSucceedHandler::new("emails")));
    let mut registry_b = HandlerRegistry::new();
    registry_b.register(Arc::new(AlwaysSucceedHandler::new("emails")));

    let runtime_a = WorkerRuntime::new(store.clone(), Arc::new(registry_a), fast_config(&["default"], 4));
    let runtime_b = WorkerRuntime::new(store.clone(), Arc::new(registry_b), fast_config(&["default"], 4));
    let shutdown_a = runtime_a.shutdown_handle();
    let shutdown_b = runtime_b.shutdown_handle();

    let handle_a = tokio::spawn(async move { runtime_a.start().await });
    let handle_b = tokio::spawn(async move { runtime_b.start().await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_a.store(true, Ordering::SeqCst);
    shutdown_b.store(true, Ordering::SeqCst);
    let stats_a = tokio::time::timeout(Duration::from_secs(2), handle_a).await.unwrap().unwrap();
    let stats_b = tokio::time::timeout(Duration::from_secs(2), handle_b).await.unwrap().unwrap();

    let all = store
        .list(jobq_core::JobFilter::default(), 0, N as i64 * 2)
        .await
        .unwrap();
    assert_eq!(all.len(), N);
    for job in &all {
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1, "claim exclusivity means exactly one attempt per job");
    }
    assert_eq!((stats_a.succeeded + stats_b.succeeded) as usize, N);
}
