//! Result collection and reconciliation

use super::{PortSet, PortState, ProbeOutcome, ScanResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe sink that probe tasks write their outcomes into
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    outcomes: Arc<Mutex<HashMap<u16, PortState>>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. The first outcome for a port is kept.
    pub async fn record(&self, outcome: ProbeOutcome) {
        let mut outcomes = self.outcomes.lock().await;
        outcomes.entry(outcome.port).or_insert(outcome.state);
    }

    pub async fn len(&self) -> usize {
        self.outcomes.lock().await.len()
    }

    /// Copy of everything recorded so far
    pub async fn snapshot(&self) -> HashMap<u16, PortState> {
        self.outcomes.lock().await.clone()
    }
}

/// Classify every port of `ports`, falling back to closed for any port
/// without a recorded outcome. Output order follows `ports`.
pub fn reconcile(ports: &PortSet, outcomes: &HashMap<u16, PortState>) -> ScanResult {
    let mut result = ScanResult::default();

    for port in ports {
        match outcomes.get(&port).copied().unwrap_or(PortState::Closed) {
            PortState::Open => result.open_ports.push(port),
            PortState::Closed => result.closed_ports.push(port),
        }
    }

    result
}
