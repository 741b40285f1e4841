//! Store error types.

use thiserror::Error;

use mflow_models::JobId;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by job store implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("job '{0}' not found")]
    NotFound(JobId),

    #[error("job '{0}' already exists")]
    AlreadyExists(JobId),

    #[error("store backend error: {0}")]
    Backend(String),
}
