//! Progress reporting for long target operations
//!
//! Bridges the core's `ProgressSink` callbacks onto indicatif. Each phase
//! gets its own bar; phases that report no unit count (the ECA bulk
//! erase, which is one opaque busy-wait) get a spinner instead.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use cpldprog_target::ProgressSink;

/// Create the standard progress bar style
pub(crate) fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Create the standard spinner style
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress reporter drawing one bar (or spinner) per phase
pub struct BarProgress {
    current: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self { current: None }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn begin(&mut self, phase: &'static str, total: u64) {
        let pb = if total == 0 {
            let pb = ProgressBar::new_spinner();
            pb.set_style(spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = ProgressBar::new(total);
            pb.set_style(bar_style());
            pb
        };
        pb.set_message(phase);
        self.current = Some(pb);
    }

    fn advance(&mut self, done: u64) {
        if let Some(pb) = &self.current {
            pb.set_position(done);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish();
        }
    }
}
