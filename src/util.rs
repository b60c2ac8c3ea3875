//! Shared validation helpers.

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Why a URL was rejected.
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Internal address not allowed: {0}")]
    InternalAddress(String),
}

/// Validate a thumbnail URL from an import payload.
///
/// Accepts public http(s) URLs only. Loopback, link-local, and private
/// ranges are rejected so an imported list cannot point the UI at
/// internal services.
pub fn validate_thumbnail_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::InternalAddress(host.to_owned()));
        }
        // Strip brackets from IPv6 literals before parsing.
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if let Ok(ip) = bare.parse::<IpAddr>() {
            if is_internal_ip(&ip) {
                return Err(UrlValidationError::InternalAddress(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || (segments[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (segments[0] & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_https_accepted() {
        assert!(validate_thumbnail_url("https://img.example.com/a.png").is_ok());
        assert!(validate_thumbnail_url("http://cdn.example.org/b.jpg").is_ok());
    }

    #[test]
    fn non_http_schemes_rejected() {
        assert!(validate_thumbnail_url("file:///etc/passwd").is_err());
        assert!(validate_thumbnail_url("data:image/png;base64,AAAA").is_err());
        assert!(validate_thumbnail_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn internal_hosts_rejected() {
        assert!(validate_thumbnail_url("http://localhost/x.png").is_err());
        assert!(validate_thumbnail_url("http://127.0.0.1/x.png").is_err());
        assert!(validate_thumbnail_url("http://192.168.1.10/x.png").is_err());
        assert!(validate_thumbnail_url("http://10.0.0.1/x.png").is_err());
        assert!(validate_thumbnail_url("http://[::1]/x.png").is_err());
        assert!(validate_thumbnail_url("http://[fe80::1]/x.png").is_err());
    }

    #[test]
    fn garbage_rejected() {
        assert!(validate_thumbnail_url("not a url").is_err());
        assert!(validate_thumbnail_url("").is_err());
    }
}
