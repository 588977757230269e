//! Progress reporting hooks
//!
//! Long operations (a full configuration program is thousands of pages)
//! report progress through this trait so a CLI can draw a bar without the
//! core depending on any terminal crate.

/// Receives progress callbacks during program/verify/erase flows
///
/// All methods have empty defaults, so implementations only override what
/// they display.
pub trait ProgressSink {
    /// A new phase begins. `total` is the number of units (pages or bytes)
    /// the phase will process; 0 for phases without a meaningful count.
    fn begin(&mut self, phase: &'static str, total: u64) {
        let _ = (phase, total);
    }

    /// `done` units of the current phase are complete
    fn advance(&mut self, done: u64) {
        let _ = done;
    }

    /// The current phase finished
    fn finish(&mut self) {}
}

/// A sink that ignores all progress reporting
pub struct NoProgress;

impl ProgressSink for NoProgress {}
