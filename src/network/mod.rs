//! Target handling: hostname extraction and address resolution
//!
//! The scanner never resolves names itself. Callers resolve the target here
//! once, up front, and hand the engine a literal address so that no probe
//! can stall on DNS.

pub mod provider;

use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// A host as supplied by the user plus the address it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub resolved_address: Option<String>,
}

impl Target {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            resolved_address: None,
        }
    }

    /// Address to probe: the resolved one when known, the host otherwise.
    pub fn address(&self) -> &str {
        self.resolved_address.as_deref().unwrap_or(&self.host)
    }
}

/// Pull the hostname out of a URL, `host:port` pair or bare host.
///
/// ```
/// use portscout::network::extract_hostname;
///
/// assert_eq!(extract_hostname("https://example.com/path").unwrap(), "example.com");
/// assert_eq!(extract_hostname("example.com:8080").unwrap(), "example.com");
/// ```
pub fn extract_hostname(input: &str) -> crate::Result<String> {
    let trimmed = input.trim();

    // Bare IPv6 literals contain colons that are not port separators.
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Ok(ip.to_string());
    }

    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed.strip_prefix("//").unwrap_or(trimmed),
    };

    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    // Drop any userinfo ("user:pass@host").
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let host = if let Some(rest) = authority.strip_prefix('[') {
        rest.split(']').next().unwrap_or_default()
    } else {
        authority.split(':').next().unwrap_or_default()
    };

    let host = host.trim();
    if host.is_empty() {
        return Err(ScanError::InvalidTarget(format!(
            "No hostname found in '{}'",
            input
        )));
    }

    Ok(host.to_string())
}

/// Resolve `host` to a single address, bounded by `timeout`.
///
/// Literal IPs are returned untouched. For names, the first IPv4 address
/// wins; if there is none the first address of any family is used.
pub async fn resolve(host: &str, timeout: Duration) -> crate::Result<Target> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(Target {
            host: host.to_string(),
            resolved_address: Some(ip.to_string()),
        });
    }

    let lookup = tokio::net::lookup_host((host, 0));
    let addrs: Vec<SocketAddr> = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(e)) => {
            return Err(ScanError::Resolution {
                host: host.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ScanError::Resolution {
                host: host.to_string(),
                reason: format!("timed out after {:?}", timeout),
            })
        }
    };

    let chosen = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .ok_or_else(|| ScanError::Resolution {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        })?;

    log::debug!("Resolved {} to {} ({} candidates)", host, chosen.ip(), addrs.len());

    Ok(Target {
        host: host.to_string(),
        resolved_address: Some(chosen.ip().to_string()),
    })
}
