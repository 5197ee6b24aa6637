//! # jobq-core
//!
//! Core traits and types for a durable, Postgres-backed background job
//! queue. This crate is backend-agnostic: it defines the [`job::Job`] model,
//! the [`store::JobStore`] trait that every durable backend implements, the
//! pure [`retry`] policy, and the [`handler::HandlerRegistry`] that maps a
//! job's `job_type` to the code that runs it.
//!
//! ## Architecture
//!
//! ```text
//! Producer API ──enqueue──► JobStore ◄──claim_next── Worker Runtime
//!                               │                         │
//!                               │                         ▼
//!                               │                   HandlerRegistry
//!                               │                         │
//!                               └───mark_completed/failed─┘
//! ```
//!
//! The claim protocol on [`store::JobStore::claim_next`] is the one place
//! where correctness under concurrent workers is load-bearing: it must
//! atomically select and claim a job so that no two callers ever observe
//! the same row as claimed. See the `jobq-postgres` crate for the
//! `FOR UPDATE SKIP LOCKED` implementation.

mod error;
pub mod handler;
pub mod job;
pub mod retry;
pub mod store;

pub use error::{JobQueueError, Result};
pub use handler::{HandlerRegistry, JobHandler};
pub use job::{validate_payload, EnqueueSpec, Job, JobFilter, JobStats, JobStatus, DEFAULT_QUEUE};
pub use retry::{decide as decide_retry, RetryDecision};
pub use store::JobStore;

pub use async_trait::async_trait;
