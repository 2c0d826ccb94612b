//! Error handling for the portscout scanner
//!
//! Only structurally invalid input surfaces as a scan-level error. Probe
//! failures never reach this type: they are folded into a closed port.

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid port: {0}")]
    InvalidPort(u32),

    #[error("Port range error: {0}")]
    PortRangeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Failed to resolve hostname '{host}': {reason}")]
    Resolution { host: String, reason: String },

    #[error("History error: {0}")]
    HistoryError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ScanError {
    /// True for errors raised while validating input, before any probing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidPort(_) | ScanError::PortRangeError(_) | ScanError::ConfigError(_)
        )
    }
}
