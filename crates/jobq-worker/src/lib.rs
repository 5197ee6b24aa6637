//! # jobq-worker
//!
//! The worker runtime (C4): a single process that repeatedly polls a
//! `JobStore` for claimable work, runs up to `max_concurrent_jobs` handlers
//! concurrently, and recovers cleanly from both empty queues (adaptive
//! backoff) and shutdown signals (bounded drain).
//!
//! ## Main loop
//!
//! ```text
//! loop until shutdown:
//!     reap finished executions, folding outcomes into counters
//!     if no free slot: sleep(poll_interval); continue
//!     claim_next()
//!         Some(job) -> spawn execution, reset poll interval
//!         None      -> backoff only if no jobs are in flight
//!     on any error: log, sleep(poll_interval), keep looping
//! drain in-flight executions (60s grace), then abort stragglers
//! ```
//!
//! Polling itself never blocks job execution: a busy worker keeps polling at
//! the base interval to refill slots as soon as they free, and only backs
//! off geometrically while fully idle.

mod config;
mod runtime;
mod signal;

pub use config::WorkerConfig;
pub use runtime::{WorkerRuntime, WorkerStats};
pub use signal::install as install_shutdown_signal;
