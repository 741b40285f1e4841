//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the storage mediator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported URI scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("host '{host}' resolves to a {category} address")]
    SsrfBlocked { host: String, category: String },

    #[error("scheme '{scheme}' does not support {operation}")]
    NotSupported {
        scheme: &'static str,
        operation: &'static str,
    },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("refusing to remove '{0}': not a staging directory")]
    RefusedCleanup(PathBuf),

    #[error("storage configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorageError {
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed(message.into())
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::UploadFailed(message.into())
    }
}
