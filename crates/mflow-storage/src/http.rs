//! HTTP(S) backend: read and existence checks only.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::ssrf::validate_http_uri;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Backend for `http://` and `https://` sources.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBackend {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Stream the body to a local file. The SSRF screen runs first.
    pub async fn get(&self, uri: &str, dest: &Path) -> StorageResult<()> {
        validate_http_uri(uri).await?;

        debug!(%uri, dest = %dest.display(), "downloading");
        let response = self.client.get(uri).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::download_failed(format!(
                "{} returned {}",
                uri,
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn exists(&self, uri: &str) -> StorageResult<bool> {
        validate_http_uri(uri).await?;
        let response = self.client.head(uri).send().await?;
        Ok(response.status().is_success())
    }

    pub async fn put(&self, _src: &Path, _uri: &str) -> StorageResult<()> {
        Err(StorageError::NotSupported {
            scheme: "http",
            operation: "put",
        })
    }

    pub async fn delete(&self, _uri: &str) -> StorageResult<()> {
        Err(StorageError::NotSupported {
            scheme: "http",
            operation: "delete",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_not_supported() {
        let backend = HttpBackend::new();
        let err = backend
            .put(Path::new("/tmp/x"), "https://example.com/x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotSupported { .. }));
        assert!(matches!(
            backend.delete("https://example.com/x").await.unwrap_err(),
            StorageError::NotSupported { .. }
        ));
    }

    #[tokio::test]
    async fn get_screens_for_ssrf_before_any_request() {
        let backend = HttpBackend::new();
        let err = backend
            .get("http://127.0.0.1/x.mp4", Path::new("/tmp/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SsrfBlocked { .. }));
    }
}
