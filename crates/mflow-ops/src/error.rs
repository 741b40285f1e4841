//! Error types for operator validation and compilation.

use thiserror::Error;

/// Result type for operator operations.
pub type OpResult<T> = Result<T, OpError>;

/// Errors surfaced by operators and the catalogue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("parameter {name}: {reason}")]
    Parameter { name: String, reason: String },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{op}' expects {min}..{max} inputs, got {got}")]
    Arity {
        op: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("missing media info for {0}")]
    MissingMetadata(String),

    #[error("no {0} stream available")]
    MissingStream(&'static str),

    #[error("{0}")]
    Invalid(String),
}

impl OpError {
    /// Parameter failure, rendered as `parameter <name>: <reason>`.
    pub fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
