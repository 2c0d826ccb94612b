//! Port lists and the port→service table used when rendering results

use crate::ScanError;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Name shown for ports missing from the table
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

static PORT_SERVICES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (21, "FTP"),
        (22, "SSH"),
        (23, "Telnet"),
        (25, "SMTP"),
        (53, "DNS"),
        (80, "HTTP"),
        (110, "POP3"),
        (143, "IMAP"),
        (443, "HTTPS"),
        (445, "SMB"),
        (465, "SMTPS"),
        (587, "SMTP-Submission"),
        (993, "IMAPS"),
        (995, "POP3S"),
        (3306, "MySQL"),
        (3389, "RDP"),
        (5432, "PostgreSQL"),
        (8080, "HTTP-Proxy"),
        (8443, "HTTPS-Alt"),
    ])
});

/// Service name for `port`, or [`UNKNOWN_SERVICE`].
pub fn service_name(port: u16) -> &'static str {
    PORT_SERVICES.get(&port).copied().unwrap_or(UNKNOWN_SERVICE)
}

/// Built-in port lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortList {
    /// FTP, SSH, HTTP, HTTPS
    Default,
    /// Common internet-facing services
    Important,
}

impl PortList {
    pub fn ports(&self) -> Vec<u16> {
        match self {
            PortList::Default => vec![21, 22, 80, 443],
            PortList::Important => vec![
                21, 22, 23, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 3306, 3389, 5432, 8080,
                8443,
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PortList::Default => "default",
            PortList::Important => "important",
        }
    }
}

impl FromStr for PortList {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(PortList::Default),
            "important" => Ok(PortList::Important),
            other => Err(ScanError::PortRangeError(format!(
                "Unknown port list '{}' (expected 'default' or 'important')",
                other
            ))),
        }
    }
}

/// Parse a port specification such as `"22,80-85,443"`.
///
/// Accepts single ports and inclusive ranges separated by commas. The
/// result is sorted ascending with duplicates removed.
pub fn parse_port_spec(spec: &str) -> crate::Result<Vec<u16>> {
    let mut ports = BTreeSet::new();

    for part in spec.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start, part)?;
            let end = parse_port(end, part)?;
            if start > end {
                return Err(ScanError::PortRangeError(format!(
                    "Invalid port range: {}. Start port must not exceed end port",
                    part
                )));
            }
            ports.extend(start..=end);
        } else {
            ports.insert(parse_port(part, part)?);
        }
    }

    if ports.is_empty() {
        return Err(ScanError::PortRangeError(format!(
            "No ports found in '{}'",
            spec
        )));
    }

    Ok(ports.into_iter().collect())
}

fn parse_port(value: &str, part: &str) -> crate::Result<u16> {
    let value = value.trim();
    let port: u32 = value
        .parse()
        .map_err(|_| ScanError::PortRangeError(format!("Invalid port number: {}", part)))?;

    if port == 0 || port > u16::MAX as u32 {
        return Err(ScanError::PortRangeError(format!(
            "Invalid port number: {}. Ports must be between 1-65535",
            part
        )));
    }

    Ok(port as u16)
}
