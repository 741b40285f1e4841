//! Local filesystem backend.

use std::path::Path;

use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::uri::file_path;

/// Backend for `file://` URIs and bare paths.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    pub async fn get(&self, uri: &str, dest: &Path) -> StorageResult<()> {
        let src = file_path(uri);
        if !fs::try_exists(&src).await? {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&src, dest).await?;
        Ok(())
    }

    pub async fn put(&self, src: &Path, uri: &str) -> StorageResult<()> {
        let dest = file_path(uri);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(src, &dest).await?;
        Ok(())
    }

    pub async fn exists(&self, uri: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(file_path(uri)).await?)
    }

    pub async fn delete(&self, uri: &str) -> StorageResult<()> {
        let path = file_path(uri);
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trips_a_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload").await.unwrap();

        let backend = LocalBackend::new();
        let uri = format!("file://{}", dir.path().join("stored.bin").display());

        backend.put(&src, &uri).await.unwrap();
        assert!(backend.exists(&uri).await.unwrap());

        let fetched = dir.path().join("fetched.bin");
        backend.get(&uri, &fetched).await.unwrap();
        assert_eq!(fs::read(&fetched).await.unwrap(), b"payload");

        backend.delete(&uri).await.unwrap();
        assert!(!backend.exists(&uri).await.unwrap());
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let backend = LocalBackend::new();
        let err = backend
            .get("file:///definitely/missing.bin", Path::new("/tmp/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
