//! Terminal progress bar fed by the scanner's progress reporter

use crate::scanner::ProgressSnapshot;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ports ({percent}%)";

/// Progress bar for one scan
pub struct ScanProgressBar {
    bar: ProgressBar,
}

impl ScanProgressBar {
    /// Visible bar on stderr
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }

    /// Bar that draws nothing, for `--no-progress` and machine formats.
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        Self { bar }
    }

    pub fn update(&self, snapshot: ProgressSnapshot) {
        self.bar.set_length(snapshot.total as u64);
        self.bar.set_position(snapshot.completed as u64);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Handle that can be moved into the reporter callback.
    pub fn handle(&self) -> Self {
        Self { bar: self.bar.clone() }
    }

    pub fn finish(&self, snapshot: ProgressSnapshot) {
        self.update(snapshot);
        if snapshot.is_complete() {
            self.bar.finish_and_clear();
        } else {
            self.bar.abandon();
        }
    }
}
