//! Main scanning engine implementation
//!
//! The engine fans probes out over a semaphore-bounded pool. The global
//! deadline only stops *new* dispatches; probes already running are bounded
//! by their own timeout. Once dispatching ends the engine waits for the
//! stragglers (at most until `deadline + timeout`), then reconciles.

use crate::config::ScanConfig;
use crate::scanner::aggregator::{self, ResultSink};
use crate::scanner::{
    Deadline, PortSet, ProbeOutcome, ProgressTracker, Prober, ScanResult, TcpConnectProber,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

/// Scheduling slack allowed on top of `deadline + timeout` before the engine
/// stops waiting for in-flight probes.
const WAIT_SLACK: Duration = Duration::from_millis(50);

/// Main scanning engine
pub struct ScanEngine {
    address: Arc<str>,
    config: ScanConfig,
    prober: Arc<dyn Prober>,
}

impl ScanEngine {
    /// Create a new scan engine against an already-resolved address
    pub fn new(address: impl Into<String>, config: ScanConfig) -> crate::Result<Self> {
        config.validate()?;

        let address: String = address.into();
        if address.trim().is_empty() {
            return Err(crate::ScanError::InvalidTarget(
                "Target address cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            address: Arc::from(address.trim()),
            config,
            prober: Arc::new(TcpConnectProber::new()),
        })
    }

    /// Swap the probe implementation
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Validate `ports` and scan them with a fresh deadline.
    pub async fn scan<I>(&self, ports: I) -> crate::Result<ScanResult>
    where
        I: IntoIterator,
        I::Item: Into<u32>,
    {
        let ports = PortSet::new(ports)?;
        let progress = Arc::new(ProgressTracker::new(ports.len()));
        let deadline = Deadline::new(self.config.deadline_duration());
        Ok(self.scan_until(&ports, deadline, progress).await)
    }

    /// Scan an already-validated port set against an explicit deadline,
    /// reporting completions into `progress`.
    pub async fn scan_until(
        &self,
        ports: &PortSet,
        deadline: Deadline,
        progress: Arc<ProgressTracker>,
    ) -> ScanResult {
        let start_time = Instant::now();

        if ports.is_empty() {
            log::debug!("No ports requested for {}, nothing to dispatch", self.address);
            return ScanResult::default();
        }

        let probe_timeout = self.config.timeout_duration();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let sink = ResultSink::new();
        let mut handles = Vec::with_capacity(ports.len());

        log::info!(
            "Scanning {} ports on {} ({} workers, {:?} per probe, {:?} budget)",
            ports.len(),
            self.address,
            self.config.max_concurrency,
            probe_timeout,
            deadline.remaining()
        );

        for port in ports {
            if deadline.is_expired() {
                log::debug!("Deadline reached before dispatching port {}", port);
                break;
            }

            // Waiting for a slot is abandoned once the deadline passes.
            let acquire = semaphore.clone().acquire_owned();
            let permit = match timeout_at(deadline.instant(), acquire).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => break,
                Err(_) => {
                    log::debug!("Deadline reached while waiting for a free slot (port {})", port);
                    break;
                }
            };

            let prober = self.prober.clone();
            let address = self.address.clone();
            let sink = sink.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = prober.probe(&address, port, probe_timeout).await;
                // Keyed by the dispatched port whatever the prober reports.
                sink.record(ProbeOutcome::new(port, outcome.state)).await;
                progress.increment();
            }));
        }

        let dispatched = handles.len();
        let cutoff = deadline.extended_by(probe_timeout + WAIT_SLACK).instant();

        match timeout_at(cutoff, futures::future::join_all(handles.iter_mut())).await {
            Ok(joined) => {
                for err in joined.into_iter().filter_map(Result::err) {
                    log::warn!("Probe task failed: {}", err);
                }
            }
            Err(_) => {
                let stragglers = handles.iter().filter(|h| !h.is_finished()).count();
                log::warn!(
                    "{} probes still running past the deadline grace period, abandoning them",
                    stragglers
                );
                for handle in &handles {
                    handle.abort();
                }
            }
        }

        let outcomes = sink.snapshot().await;
        let backfilled = ports.len() - outcomes.len();
        if backfilled > 0 {
            log::warn!(
                "{} of {} ports unclassified before the deadline, reported closed ({} dispatched)",
                backfilled,
                ports.len(),
                dispatched
            );
        }

        let result = aggregator::reconcile(ports, &outcomes);
        log::info!(
            "Scan of {} finished in {:.2?}: {} open, {} closed",
            self.address,
            start_time.elapsed(),
            result.open_ports.len(),
            result.closed_ports.len()
        );

        result
    }
}
