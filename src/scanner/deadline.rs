//! Scan-wide deadline

use std::time::Duration;
use tokio::time::Instant;

/// Fallback horizon when `now + timeout` would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Wall-clock ceiling for one scan, fixed when the scan starts.
///
/// Reads are side-effect free and uncoordinated: the scheduler and the
/// progress reporter may both poll it while probes are still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    instant: Instant,
}

impl Deadline {
    /// `now + global_timeout`. A zero timeout is already expired.
    pub fn new(global_timeout: Duration) -> Self {
        let now = Instant::now();
        let instant = now
            .checked_add(global_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { instant }
    }

    pub fn at(instant: Instant) -> Self {
        Self { instant }
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.instant
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.instant.saturating_duration_since(Instant::now())
    }

    /// The deadline pushed back by `extra`.
    pub fn extended_by(&self, extra: Duration) -> Self {
        let instant = self
            .instant
            .checked_add(extra)
            .unwrap_or_else(|| self.instant + FAR_FUTURE);
        Self { instant }
    }
}
