//! Scanner module containing the port-probing engine
//!
//! Ports flow through the engine as follows: a validated [`PortSet`] is
//! dispatched onto a bounded pool of probes, each finished probe lands in a
//! shared sink and bumps the [`progress::ProgressTracker`], and once the
//! dispatch-and-wait phase ends the [`aggregator`] reconciles the sink
//! against the full port list so that every requested port is classified.

pub mod aggregator;
pub mod deadline;
pub mod engine;
pub mod probe;
pub mod progress;

use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use deadline::Deadline;
pub use engine::ScanEngine;
pub use probe::{Prober, TcpConnectProber};
pub use progress::{ProgressSnapshot, ProgressTracker};

/// Port state enumeration.
///
/// A connect scan cannot tell a refused port from a filtered one, so both
/// collapse into `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

impl PortState {
    pub fn is_open(&self) -> bool {
        matches!(self, PortState::Open)
    }
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
        }
    }
}

/// Result of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub port: u16,
    pub state: PortState,
}

impl ProbeOutcome {
    pub fn new(port: u16, state: PortState) -> Self {
        Self { port, state }
    }

    pub fn open(port: u16) -> Self {
        Self::new(port, PortState::Open)
    }

    pub fn closed(port: u16) -> Self {
        Self::new(port, PortState::Closed)
    }
}

/// Ordered, duplicate-free list of ports in `1..=65535`.
///
/// The first occurrence of a port fixes its position; later duplicates are
/// dropped so they never take a pool slot or count twice toward progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    /// Build a port set, rejecting anything outside `1..=65535`.
    pub fn new<I>(ports: I) -> crate::Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<u32>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for raw in ports {
            let raw: u32 = raw.into();
            if raw == 0 || raw > u16::MAX as u32 {
                return Err(ScanError::InvalidPort(raw));
            }

            let port = raw as u16;
            if seen.insert(port) {
                ordered.push(port);
            }
        }

        Ok(Self { ports: ordered })
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }
}

impl<'a> IntoIterator for &'a PortSet {
    type Item = u16;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u16>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.iter().copied()
    }
}

/// Final classification of a scan.
///
/// Both lists keep the relative order of the [`PortSet`] they came from;
/// together they cover it exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// List of open ports
    pub open_ports: Vec<u16>,

    /// List of closed ports, including ports never probed before the deadline
    pub closed_ports: Vec<u16>,
}

impl ScanResult {
    /// Get the total number of ports classified
    pub fn total_ports(&self) -> usize {
        self.open_ports.len() + self.closed_ports.len()
    }

    pub fn is_open(&self, port: u16) -> bool {
        self.open_ports.contains(&port)
    }

    /// State of `port`, or `None` when it was not part of the scan.
    pub fn state_of(&self, port: u16) -> Option<PortState> {
        if self.open_ports.contains(&port) {
            Some(PortState::Open)
        } else if self.closed_ports.contains(&port) {
            Some(PortState::Closed)
        } else {
            None
        }
    }
}
