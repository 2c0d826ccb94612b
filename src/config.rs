//! Configuration module for the portscout scanner

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Timeout for each connection attempt in milliseconds
    pub timeout: u64,

    /// Wall-clock ceiling for the whole scan in milliseconds.
    /// Zero is a deadline that has already passed.
    pub deadline: u64,

    /// Maximum number of probes in flight at once
    pub max_concurrency: usize,

    /// Upper bound on hostname resolution in milliseconds
    pub resolve_timeout: u64,

    /// Upper bound on the hosting provider lookup in milliseconds
    pub provider_timeout: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: 1000,
            deadline: 30_000,
            max_concurrency: 20,
            resolve_timeout: 5000,
            provider_timeout: 5000,
        }
    }
}

impl ScanConfig {
    /// Create a configuration from the three knobs the engine needs.
    ///
    /// Durations are kept in whole milliseconds, rounded up so that a
    /// positive duration never becomes zero.
    pub fn new(timeout: Duration, deadline: Duration, max_concurrency: usize) -> Self {
        Self {
            timeout: ceil_millis(timeout),
            deadline: ceil_millis(deadline),
            max_concurrency,
            ..Default::default()
        }
    }

    /// Set the per-probe timeout in milliseconds
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the global deadline in milliseconds
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the worker pool size
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn deadline_duration(&self) -> Duration {
        Duration::from_millis(self.deadline)
    }

    pub fn resolve_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout)
    }

    pub fn provider_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.provider_timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScanConfig = toml::from_str(&content)
            .map_err(|e| crate::ScanError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from `~/.portscout.toml`, or defaults when absent.
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let path = home_dir.join(".portscout.toml");

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout == 0 {
            return Err(crate::ScanError::ConfigError(
                "Probe timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrency == 0 {
            return Err(crate::ScanError::ConfigError(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(crate::ScanError::ConfigError(format!(
                "Concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(())
    }
}

fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
