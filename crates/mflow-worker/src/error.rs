//! Driver error types.

use thiserror::Error;

use mflow_models::ErrorInfo;

/// Outcome of a failed drive: either interrupted by cancellation, or
/// failed with classified error info ready for the job record.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("job cancelled")]
    Cancelled,

    #[error("{}", .0.message)]
    Failed(ErrorInfo),
}

impl DriveError {
    pub fn validation(err: impl std::fmt::Display) -> Self {
        Self::Failed(ErrorInfo::validation(err.to_string()))
    }

    pub fn planning(err: impl std::fmt::Display) -> Self {
        Self::Failed(ErrorInfo::planning(err.to_string()))
    }

    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Failed(ErrorInfo::execution(err.to_string()))
    }
}
