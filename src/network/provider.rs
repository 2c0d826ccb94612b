//! Hosting provider lookup via ip-api.com

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const LOOKUP_URL: &str = "http://ip-api.com/json";
const UNKNOWN: &str = "Unknown";

/// Who hosts an address, as far as ip-api.com knows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingInfo {
    pub org: String,
    pub isp: String,
    pub country: String,
    pub city: String,
}

impl HostingInfo {
    pub fn unknown() -> Self {
        Self {
            org: UNKNOWN.to_string(),
            isp: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
        }
    }

    /// Build from an ip-api.com response body. Anything but a
    /// `"status": "success"` body is unknown.
    pub fn from_response(body: &Value) -> Self {
        if body.get("status").and_then(Value::as_str) != Some("success") {
            return Self::unknown();
        }

        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        Self {
            org: field("org"),
            isp: field("isp"),
            country: field("country"),
            city: field("city"),
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// Look up the hosting provider of `ip`. Never fails: every error path
/// degrades to [`HostingInfo::unknown`].
pub async fn lookup_provider(ip: &str, timeout: Duration) -> HostingInfo {
    lookup_provider_at(LOOKUP_URL, ip, timeout).await
}

/// Same as [`lookup_provider`] against another ip-api compatible endpoint.
pub async fn lookup_provider_at(base_url: &str, ip: &str, timeout: Duration) -> HostingInfo {
    match fetch(base_url, ip, timeout).await {
        Ok(body) => HostingInfo::from_response(&body),
        Err(e) => {
            log::warn!("Hosting provider lookup for {} failed: {}", ip, e);
            HostingInfo::unknown()
        }
    }
}

async fn fetch(base_url: &str, ip: &str, timeout: Duration) -> Result<Value, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    client
        .get(format!("{}/{}", base_url.trim_end_matches('/'), ip))
        .send()
        .await?
        .json::<Value>()
        .await
}
