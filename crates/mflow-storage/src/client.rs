//! Scheme-dispatched storage client.

use std::path::Path;
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::http::HttpBackend;
use crate::local::LocalBackend;
use crate::s3::S3Backend;
use crate::ssrf::validate_http_uri;
use crate::uri::{parse_scheme, Scheme};

/// One `get`/`put`/`exists`/`delete` contract over whitelisted URIs,
/// dispatched to the backend owning the scheme.
#[derive(Clone)]
pub struct StorageClient {
    local: LocalBackend,
    http: HttpBackend,
    s3: Option<Arc<S3Backend>>,
}

impl StorageClient {
    /// Client with every backend, the S3 one built from the environment.
    pub async fn from_env() -> StorageResult<Self> {
        Ok(Self {
            local: LocalBackend::new(),
            http: HttpBackend::new(),
            s3: Some(Arc::new(S3Backend::from_env().await?)),
        })
    }

    /// Client without the S3 backend; `s3://` URIs fail with a
    /// configuration error. Useful in tests and local-only deployments.
    pub fn local_only() -> Self {
        Self {
            local: LocalBackend::new(),
            http: HttpBackend::new(),
            s3: None,
        }
    }

    fn s3(&self) -> StorageResult<&S3Backend> {
        self.s3
            .as_deref()
            .ok_or_else(|| StorageError::Config("s3 backend not configured".to_string()))
    }

    /// Download a URI to a local path.
    pub async fn get(&self, uri: &str, dest: &Path) -> StorageResult<()> {
        match parse_scheme(uri)? {
            Scheme::File => self.local.get(uri, dest).await,
            Scheme::Http | Scheme::Https => self.http.get(uri, dest).await,
            Scheme::S3 => self.s3()?.get(uri, dest).await,
            other => Err(StorageError::NotSupported {
                scheme: other.as_str(),
                operation: "get",
            }),
        }
    }

    /// Upload a local file to a URI.
    pub async fn put(&self, src: &Path, uri: &str) -> StorageResult<()> {
        match parse_scheme(uri)? {
            Scheme::File => self.local.put(src, uri).await,
            Scheme::Http | Scheme::Https => self.http.put(src, uri).await,
            Scheme::S3 => self.s3()?.put(src, uri).await,
            other => Err(StorageError::NotSupported {
                scheme: other.as_str(),
                operation: "put",
            }),
        }
    }

    pub async fn exists(&self, uri: &str) -> StorageResult<bool> {
        match parse_scheme(uri)? {
            Scheme::File => self.local.exists(uri).await,
            Scheme::Http | Scheme::Https => self.http.exists(uri).await,
            Scheme::S3 => self.s3()?.exists(uri).await,
            other => Err(StorageError::NotSupported {
                scheme: other.as_str(),
                operation: "exists",
            }),
        }
    }

    pub async fn delete(&self, uri: &str) -> StorageResult<()> {
        match parse_scheme(uri)? {
            Scheme::File => self.local.delete(uri).await,
            Scheme::Http | Scheme::Https => self.http.delete(uri).await,
            Scheme::S3 => self.s3()?.delete(uri).await,
            other => Err(StorageError::NotSupported {
                scheme: other.as_str(),
                operation: "delete",
            }),
        }
    }
}

/// Screen a URI before a job is accepted: the scheme must be whitelisted
/// and http(s) hosts must pass the SSRF check.
pub async fn validate_uri(uri: &str) -> StorageResult<()> {
    match parse_scheme(uri)? {
        Scheme::Http | Scheme::Https => validate_http_uri(uri).await,
        _ => Ok(()),
    }
}
