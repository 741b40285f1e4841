//! SSRF screening for http(s) sources.
//!
//! The hostname is resolved and every resulting address is checked against
//! loopback, RFC-1918 private and link-local ranges. Link-local covers the
//! cloud metadata endpoints (169.254.169.254).

use std::net::IpAddr;

use tracing::warn;
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Validate an http(s) URI against private-address targets.
///
/// The failure message names the blocked category: `localhost`,
/// `private network` or `link-local`.
pub async fn validate_http_uri(uri: &str) -> StorageResult<()> {
    let parsed =
        Url::parse(uri).map_err(|e| StorageError::invalid_uri(uri, e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(StorageError::UnsupportedScheme(other.to_string())),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| StorageError::invalid_uri(uri, "missing host"))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(443);

    let addrs = resolve(&host, port).await?;
    if addrs.is_empty() {
        return Err(StorageError::invalid_uri(uri, "host did not resolve"));
    }

    for addr in addrs {
        if let Some(category) = blocked_category(addr) {
            warn!(host = %host, %addr, category, "blocked non-public address");
            return Err(StorageError::SsrfBlocked {
                host,
                category: category.to_string(),
            });
        }
    }
    Ok(())
}

async fn resolve(host: &str, port: u16) -> StorageResult<Vec<IpAddr>> {
    // IP literals skip DNS.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| StorageError::invalid_uri(host, format!("resolution failed: {}", e)))?
        .map(|sock| sock.ip())
        .collect();
    Ok(addrs)
}

/// The blocked category an address falls in, if any.
fn blocked_category(addr: IpAddr) -> Option<&'static str> {
    match addr {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Some("localhost")
            } else if v4.is_private() {
                Some("private network")
            } else if v4.is_link_local() {
                Some("link-local")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return blocked_category(IpAddr::V4(mapped));
            }
            if v6.is_loopback() {
                Some("localhost")
            } else if (v6.segments()[0] & 0xfe00) == 0xfc00 {
                Some("private network")
            } else if (v6.segments()[0] & 0xffc0) == 0xfe80 {
                Some("link-local")
            } else {
                None
            }
        }
    }
}
