//! Manual connection validation.
//!
//! Checks are syntactic only — reachability is established by the
//! certificate fingerprint fetch that follows bridge selection.

use std::net::IpAddr;

use crate::DiscoveryError;

/// Validates a manually entered host and port.
pub fn validate_manual_connection(host: &str, port: u16) -> Result<(), DiscoveryError> {
    let host = host.trim();

    if host.is_empty() {
        return Err(DiscoveryError::Invalid("host must not be empty".into()));
    }
    if port == 0 {
        return Err(DiscoveryError::Invalid("port must be 1-65535".into()));
    }
    if host.contains("://") {
        return Err(DiscoveryError::Invalid(
            "host must not include a scheme".into(),
        ));
    }
    if host.contains(':') && host.parse::<IpAddr>().is_err() {
        return Err(DiscoveryError::Invalid(
            "host must not include a port".into(),
        ));
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if !is_valid_hostname(host) {
        return Err(DiscoveryError::Invalid(format!("invalid hostname: {host}")));
    }

    Ok(())
}

/// RFC 1123-ish hostname check: dot-separated labels of alphanumerics
/// and hyphens, no label starting or ending with a hyphen.
fn is_valid_hostname(host: &str) -> bool {
    if host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}
