//! Record consolidation: merge, sanitize, persist.
//!
//! The consolidated record wraps the manuscript and supplementary texts in a
//! fixed two-section template, runs the sanitizer over the combined body, and
//! is persisted as `<label>.txt`. The write is atomic (temp file + rename) so
//! a crash mid-write never leaves a partial artifact under the final name.
//! An empty-content record is still written — one artifact per worklist row,
//! no exceptions.

use crate::error::HarvestError;
use crate::pipeline::sanitize::sanitize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The final merged output for one record.
///
/// Exists only in memory until [`persist`] runs; the persisted form is the
/// single source of truth after the run — no intermediate HTML is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedRecord {
    pub label: String,
    pub manuscript: String,
    pub supplementary: String,
    /// Sanitized merged body; this is what gets written.
    pub text: String,
}

/// Merge manuscript and supplementary text into a sanitized record.
pub fn consolidate(
    label: &str,
    manuscript: &str,
    supplementary: &str,
    marker: &str,
) -> ConsolidatedRecord {
    let combined = format!(
        "<html><body>\n<h1>Manuscript</h1>\n{manuscript}\n<h1>Supplementary</h1>\n{supplementary}\n</body></html>"
    );
    let text = sanitize(&combined, marker);
    ConsolidatedRecord {
        label: label.to_string(),
        manuscript: manuscript.to_string(),
        supplementary: supplementary.to_string(),
        text,
    }
}

/// Write the record under `<out_dir>/<label>.txt`, atomically.
pub async fn persist(
    record: &ConsolidatedRecord,
    out_dir: &Path,
) -> Result<PathBuf, HarvestError> {
    let path = out_dir.join(format!("{}.txt", record.label));
    let write_err = |source: std::io::Error| HarvestError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(out_dir).await.map_err(write_err)?;

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, &record.text)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;

    debug!("persisted '{}' ({} chars)", path.display(), record.text.len());
    Ok(path)
}
