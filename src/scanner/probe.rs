//! Single-port connection probes

use super::{PortState, ProbeOutcome};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Strategy for classifying one port.
///
/// Implementations must return within `timeout` under every failure mode
/// and must absorb failures into [`PortState::Closed`] rather than erroring.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome;
}

/// TCP connect prober: open iff the three-way handshake completes in time
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

impl TcpConnectProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpConnectProber {
    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
        // The timeout wraps the whole connect future, name lookup included.
        let state = match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                PortState::Open
            }
            Ok(Err(e)) => {
                log::trace!("{}:{} connect failed: {}", address, port, e);
                PortState::Closed
            }
            Err(_) => {
                log::trace!("{}:{} timed out after {:?}", address, port, timeout);
                PortState::Closed
            }
        };

        ProbeOutcome::new(port, state)
    }
}

/// Probe `address:port` once with a TCP connect.
pub async fn probe(address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
    TcpConnectProber.probe(address, port, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    #[tokio::test]
    async fn listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = probe("127.0.0.1", port, Duration::from_secs(1)).await;
        assert_eq!(outcome, ProbeOutcome::open(port));
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        // Bind then drop to get a port that is very likely unused.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = probe("127.0.0.1", port, Duration::from_secs(1)).await;
        assert_eq!(outcome.state, PortState::Closed);
    }

    #[tokio::test]
    async fn unresolvable_address_is_closed_and_bounded() {
        let started = Instant::now();
        let outcome = probe("host.invalid", 80, Duration::from_millis(500)).await;
        assert_eq!(outcome, ProbeOutcome::closed(80));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    #[ignore]
    async fn blackholed_address_times_out() {
        // TEST-NET-3 is not routed; the connect hangs until the timeout.
        let started = Instant::now();
        let outcome = probe("203.0.113.1", 80, Duration::from_millis(300)).await;
        assert_eq!(outcome.state, PortState::Closed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
