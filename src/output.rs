//! Run accounting: per-record outcomes and whole-run statistics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one worklist row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Record label (also the output file stem).
    pub label: String,
    /// Whether the content API yielded full text.
    pub fulltext_available: bool,
    /// Direct-link files fetched during harvest.
    pub files_fetched: usize,
    /// Length of the normalized supplementary text, in characters.
    pub supplementary_chars: usize,
    /// Where the consolidated artifact was written, when it was.
    pub output_path: Option<PathBuf>,
    /// Set when the record degraded or failed; human-readable.
    pub error: Option<String>,
    /// Wall-clock time spent on this record.
    pub duration_ms: u64,
}

impl RecordOutcome {
    /// An artifact exists on disk for this record.
    pub fn persisted(&self) -> bool {
        self.output_path.is_some()
    }
}

/// Aggregated statistics for a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Worklist rows processed (equals rows read).
    pub total_records: usize,
    /// Records persisted with full text present.
    pub with_fulltext: usize,
    /// Records persisted but degraded (no full text, or a stage gave up).
    pub degraded: usize,
    /// Records whose artifact could not be written at all.
    pub failed: usize,
    /// Total direct-link files fetched across the run.
    pub files_fetched: usize,
    /// Whole-run wall-clock time.
    pub total_duration_ms: u64,
}

/// Everything a run produced, serializable for the CLI `--json` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub outcomes: Vec<RecordOutcome>,
    pub stats: RunStats,
}
