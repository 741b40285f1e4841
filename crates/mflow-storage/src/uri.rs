//! URI scheme parsing and the scheme whitelist.

use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

/// Schemes the mediator will touch at all.
pub const ALLOWED_SCHEMES: [&str; 6] = ["https", "http", "s3", "gs", "azure", "file"];

/// A recognised URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    Http,
    Https,
    S3,
    Gs,
    Azure,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::File => "file",
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::S3 => "s3",
            Scheme::Gs => "gs",
            Scheme::Azure => "azure",
        }
    }
}

/// Parse and whitelist a URI's scheme. Bare paths count as `file`.
pub fn parse_scheme(uri: &str) -> StorageResult<Scheme> {
    let Some((scheme, _)) = uri.split_once("://") else {
        return Ok(Scheme::File);
    };

    match scheme.to_ascii_lowercase().as_str() {
        "file" => Ok(Scheme::File),
        "http" => Ok(Scheme::Http),
        "https" => Ok(Scheme::Https),
        "s3" => Ok(Scheme::S3),
        "gs" => Ok(Scheme::Gs),
        "azure" => Ok(Scheme::Azure),
        other => Err(StorageError::UnsupportedScheme(other.to_string())),
    }
}

/// Local path of a `file` URI or bare path.
pub fn file_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// A parsed `s3://bucket/key` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    /// Parse `s3://<bucket>/<key>`; empty bucket or key is rejected.
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| StorageError::invalid_uri(uri, "expected s3:// prefix"))?;

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::invalid_uri(uri, "missing object key"))?;

        if bucket.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty bucket"));
        }
        if key.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty key"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

/// File extension of a URI's path component, for staging filenames.
pub fn extension_of(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "bin".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_schemes_parse() {
        assert_eq!(parse_scheme("file:///a.mp4").unwrap(), Scheme::File);
        assert_eq!(parse_scheme("https://x/y.mp4").unwrap(), Scheme::Https);
        assert_eq!(parse_scheme("s3://bucket/key").unwrap(), Scheme::S3);
        assert_eq!(parse_scheme("gs://bucket/key").unwrap(), Scheme::Gs);
        assert_eq!(parse_scheme("/plain/path.mp4").unwrap(), Scheme::File);
    }

    #[test]
    fn unknown_schemes_are_rejected_by_name() {
        let err = parse_scheme("ftp://host/file").unwrap_err();
        assert_eq!(err.to_string(), "unsupported URI scheme 'ftp'");
    }

    #[test]
    fn s3_uri_parsing() {
        let uri = S3Uri::parse("s3://media/videos/in.mp4").unwrap();
        assert_eq!(uri.bucket, "media");
        assert_eq!(uri.key, "videos/in.mp4");

        assert!(S3Uri::parse("s3:///key").is_err());
        assert!(S3Uri::parse("s3://bucket/").is_err());
        assert!(S3Uri::parse("s3://bucket").is_err());
    }

    #[test]
    fn file_paths_strip_the_scheme() {
        assert_eq!(file_path("file:///tmp/in.mp4"), PathBuf::from("/tmp/in.mp4"));
        assert_eq!(file_path("/tmp/in.mp4"), PathBuf::from("/tmp/in.mp4"));
    }

    #[test]
    fn extensions_for_staging() {
        assert_eq!(extension_of("https://cdn/x/video.MP4?sig=abc"), "mp4");
        assert_eq!(extension_of("s3://bucket/key/audio.wav"), "wav");
        assert_eq!(extension_of("https://cdn/stream"), "bin");
    }
}
