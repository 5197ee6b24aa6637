//! # jobq-server
//!
//! Bootstrap and HTTP surface for the jobq durable job queue: the `server`
//! binary exposes the producer/admin API over axum; the `worker` binary runs
//! the worker runtime against the same Postgres-backed store.

mod bootstrap;
mod config;
mod handlers;
mod http;
mod service;

pub use bootstrap::{bootstrap_store, connect_with_retry};
pub use config::Settings;
pub use handlers::{EmailHandler, ImageProcessingHandler, ReportGenerationHandler};
pub use http::build_router;
pub use service::{BulkCreateResult, JobService, JobUpdate};
