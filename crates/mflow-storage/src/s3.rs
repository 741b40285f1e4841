//! S3-compatible backend.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::uri::S3Uri;

/// Backend for `s3://bucket/key` URIs. Works against AWS or any
/// S3-compatible endpoint via `S3_ENDPOINT_URL` plus explicit
/// `S3_ACCESS_KEY_ID`/`S3_SECRET_ACCESS_KEY`.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from the ambient AWS environment, honouring an optional
    /// custom endpoint and explicit credentials.
    pub async fn from_env() -> StorageResult<Self> {
        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base);

        if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
            if !endpoint.is_empty() {
                builder = builder.endpoint_url(endpoint).force_path_style(true);
            }
        }
        if let (Ok(key_id), Ok(secret)) = (
            std::env::var("S3_ACCESS_KEY_ID"),
            std::env::var("S3_SECRET_ACCESS_KEY"),
        ) {
            builder = builder
                .credentials_provider(Credentials::new(key_id, secret, None, None, "mflow"));
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    pub async fn get(&self, uri: &str, dest: &Path) -> StorageResult<()> {
        let parsed = S3Uri::parse(uri)?;
        debug!(%uri, dest = %dest.display(), "downloading from s3");

        let object = self
            .client
            .get_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound(uri.to_string()),
                _ => StorageError::download_failed(e.to_string()),
            })?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;
        let mut body = object.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub async fn put(&self, src: &Path, uri: &str) -> StorageResult<()> {
        let parsed = S3Uri::parse(uri)?;
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(src = %src.display(), %uri, "uploaded");
        Ok(())
    }

    pub async fn exists(&self, uri: &str) -> StorageResult<bool> {
        let parsed = S3Uri::parse(uri)?;
        match self
            .client
            .head_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(se) if se.is_not_found() => Ok(false),
                _ => Err(StorageError::download_failed(e.to_string())),
            },
        }
    }

    pub async fn delete(&self, uri: &str) -> StorageResult<()> {
        let parsed = S3Uri::parse(uri)?;
        self.client
            .delete_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .send()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?;
        Ok(())
    }
}
