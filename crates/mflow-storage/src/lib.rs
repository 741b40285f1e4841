//! Storage mediation for Mediaflow jobs.
//!
//! This crate provides:
//! - A scheme-dispatched `get`/`put`/`exists`/`delete` client over the
//!   whitelisted URI schemes
//! - The SSRF screen for http(s) sources
//! - Execution-time staging: download inputs, rewrite the graph to local
//!   paths, upload outputs, scrub the per-job temp directory

pub mod client;
pub mod error;
pub mod http;
pub mod local;
pub mod s3;
pub mod ssrf;
pub mod stage;
pub mod uri;

pub use client::{validate_uri, StorageClient};
pub use error::{StorageError, StorageResult};
pub use ssrf::validate_http_uri;
pub use stage::{StagedJob, StagedOutput, Stager};
pub use uri::{parse_scheme, S3Uri, Scheme, ALLOWED_SCHEMES};
