//! portscout - deadline-bounded concurrent TCP port scanner
//!
//! Probes a set of ports on one host with a bounded worker pool and a hard
//! wall-clock ceiling, and always reports every requested port as either
//! open or closed.

pub mod config;
pub mod error;
pub mod history;
pub mod network;
pub mod output;
pub mod scanner;
pub mod services;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::ScanError;
pub use network::{extract_hostname, resolve, Target};
pub use output::{OutputFormat, ScanReport};
pub use scanner::{
    Deadline, PortSet, PortState, ProbeOutcome, Prober, ProgressSnapshot, ProgressTracker,
    ScanEngine, ScanResult, TcpConnectProber,
};
pub use services::{parse_port_spec, service_name, PortList};

pub type Result<T> = std::result::Result<T, ScanError>;
