//! # jobq-testing
//!
//! An in-memory [`InMemoryJobStore`] implementing the same `JobStore` trait
//! as the Postgres backend, plus a handful of deterministic fixture
//! handlers. Lets the worker runtime and producer API be exercised in unit
//! and integration tests without a live database.

mod handlers;
mod store;

pub use handlers::{AlwaysFailHandler, AlwaysSucceedHandler, FailNTimesThenSucceedHandler};
pub use store::InMemoryJobStore;
