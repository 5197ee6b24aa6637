//! The error taxonomy shared by the store, the worker, and the producer API.

use thiserror::Error;

/// Every failure the queue can surface, classified per the propagation policy:
/// validation and not-found are producer-boundary errors; `Store` and
/// `UnknownJobType` are the ones the worker runtime treats specially.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("unknown job type: '{0}'")]
    UnknownJobType(String),

    #[error("job store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, JobQueueError>;
