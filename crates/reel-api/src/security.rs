//! Input validation for user-supplied identifiers and URLs.
//!
//! Product URLs are fetched server-side by the scraper, so anything that
//! resolves to loopback, private ranges or cloud metadata is refused
//! before a job is created.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::{Host, Url};

/// Maximum URL length to prevent DoS attacks.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum user id length.
pub const MAX_USER_ID_LENGTH: usize = 128;

/// Hostnames that always point inside the deployment.
static BLOCKED_HOSTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^localhost$").unwrap(),
        Regex::new(r"\.localhost$").unwrap(),
        Regex::new(r"^metadata\.").unwrap(),
        Regex::new(r"\.internal$").unwrap(),
        Regex::new(r"\.local$").unwrap(),
    ]
});

/// Result of source URL validation.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationResult {
    /// URL is valid; carries the trimmed URL
    Valid(String),
    /// Malformed or unsupported protocol
    Invalid(String),
    /// Targets an internal or metadata endpoint
    Blocked(String),
    TooLong,
}

impl UrlValidationResult {
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) | Self::Blocked(msg) => Err(msg),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
        }
    }
}

/// Validate a product listing URL.
///
/// Any public http(s) host is accepted; there is no domain allow-list.
pub fn validate_source_url(url: &str) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Invalid("source_url cannot be empty".to_string());
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    let blocked = match parsed.host() {
        None => return UrlValidationResult::Invalid("URL must have a host".to_string()),
        Some(Host::Ipv4(ip)) => is_internal_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_internal_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            BLOCKED_HOSTS.iter().any(|pattern| pattern.is_match(&domain))
        }
    };
    if blocked {
        warn!(url = %url, "Blocked internal source URL");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    UrlValidationResult::Valid(url.to_string())
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // carrier-grade NAT, 100.64.0.0/10
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_internal_ip(IpAddr::V4(v4)))
        }
    }
}

/// Job ids are UUIDs in practice; accept any short token of safe characters.
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Trim a user id and reject empty, oversized or control-character values.
pub fn normalize_user_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_USER_ID_LENGTH
        || trimmed.chars().any(char::is_control)
    {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_shop_urls_are_valid() {
        assert_eq!(
            validate_source_url(" https://shop.example.com/products/42 "),
            UrlValidationResult::Valid("https://shop.example.com/products/42".to_string())
        );
        assert!(matches!(
            validate_source_url("http://8.8.8.8/item"),
            UrlValidationResult::Valid(_)
        ));
    }

    #[test]
    fn test_blocked_internal_hosts() {
        for url in [
            "http://127.0.0.1/item",
            "http://localhost:8080/item",
            "http://10.0.0.5/item",
            "http://172.20.1.1/item",
            "http://192.168.1.1/item",
            "http://169.254.169.254/latest/meta-data/",
            "http://metadata.google.internal/computeMetadata/v1/",
            "http://[::1]/item",
            "http://[fd00::1]/item",
            "http://[::ffff:127.0.0.1]/item",
            "http://100.64.0.1/item",
        ] {
            assert!(
                matches!(validate_source_url(url), UrlValidationResult::Blocked(_)),
                "{url}"
            );
        }
    }

    #[test]
    fn test_invalid_protocols() {
        assert!(matches!(
            validate_source_url("ftp://shop.example.com/item"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(
            validate_source_url("javascript:alert(1)"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(validate_source_url("   "), UrlValidationResult::Invalid(_)));
    }

    #[test]
    fn test_too_long() {
        let url = format!("https://shop.example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert_eq!(validate_source_url(&url), UrlValidationResult::TooLong);
        assert!(UrlValidationResult::TooLong.into_result().is_err());
    }

    #[test]
    fn test_job_id_validation() {
        assert!(is_valid_job_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_job_id("job_1"));
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("../etc/passwd"));
        assert!(!is_valid_job_id(&"a".repeat(65)));
    }

    #[test]
    fn test_user_id_normalization() {
        assert_eq!(normalize_user_id("  user-1 "), Some("user-1".to_string()));
        assert_eq!(normalize_user_id("   "), None);
        assert_eq!(normalize_user_id("bad\nid"), None);
        assert_eq!(normalize_user_id(&"u".repeat(129)), None);
    }
}
