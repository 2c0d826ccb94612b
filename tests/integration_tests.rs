//! End-to-end scans against loopback listeners and instrumented probers

use async_trait::async_trait;
use portscout::{
    scanner::progress::spawn_reporter, Deadline, PortSet, ProbeOutcome, Prober, ProgressTracker,
    ScanConfig, ScanEngine, TcpConnectProber,
};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bind a listener on an ephemeral loopback port.
fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A loopback port with nothing listening on it.
fn closed_port() -> u16 {
    let (listener, port) = open_port();
    drop(listener);
    port
}

fn config(timeout_ms: u64, deadline_ms: u64, workers: usize) -> ScanConfig {
    ScanConfig::default()
        .with_timeout(timeout_ms)
        .with_deadline(deadline_ms)
        .with_concurrency(workers)
}

#[tokio::test]
async fn test_open_and_closed_ports_on_loopback() {
    let (_http, http_port) = open_port();
    let (_https, https_port) = open_port();
    let dead_port = closed_port();

    let engine = ScanEngine::new("127.0.0.1", config(1000, 10_000, 5)).unwrap();
    let result = engine.scan([http_port, https_port, dead_port]).await.unwrap();

    assert_eq!(result.open_ports, vec![http_port, https_port]);
    assert_eq!(result.closed_ports, vec![dead_port]);
}

#[tokio::test]
async fn test_zero_deadline_reports_everything_closed() {
    let (_http, http_port) = open_port();
    let (_https, https_port) = open_port();
    let dead_port = closed_port();

    let engine = ScanEngine::new("127.0.0.1", config(1000, 0, 5)).unwrap();
    let started = std::time::Instant::now();
    let result = engine.scan([http_port, https_port, dead_port]).await.unwrap();

    assert!(result.open_ports.is_empty());
    assert_eq!(result.closed_ports, vec![http_port, https_port, dead_port]);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_duplicates_classified_once() {
    let (_listener, port) = open_port();
    let dead_port = closed_port();

    let engine = ScanEngine::new("127.0.0.1", config(1000, 10_000, 5)).unwrap();
    let ports = PortSet::new([port, port, dead_port]).unwrap();
    let tracker = Arc::new(ProgressTracker::new(ports.len()));
    let deadline = Deadline::new(Duration::from_secs(10));

    let result = engine.scan_until(&ports, deadline, tracker.clone()).await;

    assert_eq!(result.open_ports, vec![port]);
    assert_eq!(result.closed_ports, vec![dead_port]);
    assert_eq!(tracker.snapshot().completed, 2);
    assert!(tracker.snapshot().is_complete());
}

/// Counts concurrent probes and finishes each after a per-port delay.
struct InstrumentedProber {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completion_order: Mutex<Vec<u16>>,
    delay: fn(u16) -> Duration,
}

impl InstrumentedProber {
    fn new(delay: fn(u16) -> Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completion_order: Mutex::new(Vec::new()),
            delay,
        }
    }
}

#[async_trait]
impl Prober for InstrumentedProber {
    async fn probe(&self, _address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(port);
        tokio::time::sleep(delay.min(timeout)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completion_order.lock().unwrap().push(port);

        if delay < timeout && port % 2 == 0 {
            ProbeOutcome::open(port)
        } else {
            ProbeOutcome::closed(port)
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_pool_size() {
    let prober = Arc::new(InstrumentedProber::new(|_| Duration::from_millis(20)));
    let engine = ScanEngine::new("192.0.2.1", config(1000, 60_000, 5))
        .unwrap()
        .with_prober(prober.clone());

    let result = engine.scan(1u16..=100).await.unwrap();

    assert_eq!(result.total_ports(), 100);
    assert_eq!(prober.peak.load(Ordering::SeqCst), 5);
    assert_eq!(prober.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_output_order_ignores_completion_order() {
    // Later ports finish first.
    let prober = Arc::new(InstrumentedProber::new(|port| {
        Duration::from_millis(200 - port as u64 * 10)
    }));
    let engine = ScanEngine::new("192.0.2.1", config(1000, 60_000, 20))
        .unwrap()
        .with_prober(prober.clone());

    let ports: Vec<u16> = (1..=10).collect();
    let result = engine.scan(ports.clone()).await.unwrap();

    let completed = prober.completion_order.lock().unwrap().clone();
    assert_eq!(completed, ports.iter().rev().copied().collect::<Vec<_>>());
    assert_eq!(result.open_ports, vec![2, 4, 6, 8, 10]);
    assert_eq!(result.closed_ports, vec![1, 3, 5, 7, 9]);
}

#[tokio::test(start_paused = true)]
async fn test_supplied_order_is_preserved() {
    let prober = Arc::new(InstrumentedProber::new(|_| Duration::from_millis(5)));
    let engine = ScanEngine::new("192.0.2.1", config(1000, 60_000, 4))
        .unwrap()
        .with_prober(prober);

    let result = engine.scan([10u16, 3, 8, 1]).await.unwrap();
    assert_eq!(result.open_ports, vec![10, 8]);
    assert_eq!(result.closed_ports, vec![3, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_bounded_by_deadline_plus_timeout() {
    // Every probe hangs for its full timeout.
    let prober = Arc::new(InstrumentedProber::new(|_| Duration::from_secs(3600)));
    let engine = ScanEngine::new("192.0.2.1", config(400, 1000, 3))
        .unwrap()
        .with_prober(prober.clone());

    let started = tokio::time::Instant::now();
    let result = engine.scan(1u16..=1000).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed <= Duration::from_millis(1000 + 400 + 50), "took {:?}", elapsed);
    assert_eq!(result.total_ports(), 1000);
    assert!(result.open_ports.is_empty());
    assert!(prober.completion_order.lock().unwrap().len() < 1000);
}

#[tokio::test(start_paused = true)]
async fn test_reporter_stops_at_deadline() {
    let tracker = Arc::new(ProgressTracker::new(10));
    tracker.increment();

    let ticks = Arc::new(AtomicUsize::new(0));
    let seen = ticks.clone();
    let deadline = Deadline::new(Duration::from_millis(1000));
    let reporter = spawn_reporter(tracker, deadline, Duration::from_millis(200), move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let last = reporter.await.unwrap();
    assert_eq!(last.completed, 1);
    assert!(!last.is_complete());
    // Immediate first tick plus one per interval up to the deadline.
    assert_eq!(ticks.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_default_prober_against_loopback() {
    let (_listener, port) = open_port();
    let prober = TcpConnectProber::new();

    let outcome = prober.probe("127.0.0.1", port, Duration::from_secs(1)).await;
    assert!(outcome.state.is_open());

    let outcome = prober
        .probe("127.0.0.1", closed_port(), Duration::from_secs(1))
        .await;
    assert!(!outcome.state.is_open());
}
