//! Progress reporting for batch runs.
//!
//! The driver surfaces record boundaries through this trait so a CLI can draw
//! a progress bar without the library depending on any terminal crate. The
//! default is a no-op.

use crate::output::RecordOutcome;

/// Observer for record-level progress. All methods have empty defaults.
pub trait RecordProgress: Send + Sync {
    /// A run is starting over `total` records.
    fn on_run_start(&self, _total: usize) {}

    /// Record `index` (0-based) of `total` is starting.
    fn on_record_start(&self, _index: usize, _total: usize, _label: &str) {}

    /// A record finished (persisted, degraded, or failed).
    fn on_record_complete(&self, _index: usize, _total: usize, _outcome: &RecordOutcome) {}

    /// The whole run finished.
    fn on_run_complete(&self, _total: usize, _failed: usize) {}
}

/// The default observer: reports nothing.
pub struct NoopProgress;

impl RecordProgress for NoopProgress {}
