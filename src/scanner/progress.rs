//! Scan progress tracking
//!
//! The tracker is written by probe tasks and read by a reporting loop that
//! runs on its own schedule. Nothing here feeds back into scheduling.

use super::Deadline;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Polling interval used by the CLI progress bar
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Completed-probe counter for one scan
#[derive(Debug)]
pub struct ProgressTracker {
    completed: AtomicUsize,
    total: usize,
}

/// Point-in-time view of a [`ProgressTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else {
            100.0
        }
    }
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one finished probe. Returns the new completed count.
    pub fn increment(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            total: self.total,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Spawn a loop that hands a snapshot to `on_tick` every `interval`.
///
/// The loop ends on its own once every probe has completed or the deadline
/// has passed, and returns the last snapshot it saw. Aborting the handle
/// early is always safe.
pub fn spawn_reporter<F>(
    tracker: Arc<ProgressTracker>,
    deadline: Deadline,
    interval: Duration,
    mut on_tick: F,
) -> JoinHandle<ProgressSnapshot>
where
    F: FnMut(ProgressSnapshot) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let snapshot = tracker.snapshot();
            on_tick(snapshot);

            if snapshot.is_complete() || deadline.is_expired() {
                break snapshot;
            }
        }
    })
}
