//! Worklist input: read the tabular bibliography file into [`WorkItem`]s.
//!
//! The worklist carries a fixed positional contract inherited from the
//! upstream spreadsheets: column 0 is the record label used for output and
//! scratch naming, column 11 the article identifier (DOI), column 12 the
//! publisher page URL. The first row is a header and is skipped. Rows shorter
//! than 13 columns yield empty fields rather than errors — an item with no
//! identifier or URL still produces a (degraded) output artifact.

use crate::error::HarvestError;
use std::path::Path;
use tracing::warn;

/// One bibliographic record to process end to end.
///
/// Created once per worklist row; immutable; consumed by one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Label used for the output file and scratch directory name.
    pub label: String,
    /// Article identifier (DOI). May be empty.
    pub article_id: String,
    /// Publisher page address. May be empty or invalid.
    pub page_url: String,
}

/// Column holding the record label.
const COL_LABEL: usize = 0;
/// Column holding the article identifier.
const COL_ARTICLE_ID: usize = 11;
/// Column holding the publisher page URL.
const COL_PAGE_URL: usize = 12;

/// Read a worklist CSV into [`WorkItem`]s.
///
/// Every data row becomes exactly one item. A blank label gets a synthesized
/// `record-N` (1-based row number) so the one-artifact-per-row invariant
/// cannot be broken by a blank cell.
pub fn load_worklist(path: impl AsRef<Path>) -> Result<Vec<WorkItem>, HarvestError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| HarvestError::WorklistUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let mut items = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| HarvestError::WorklistUnreadable {
            path: path.to_path_buf(),
            detail: format!("row {}: {e}", idx + 1),
        })?;
        items.push(item_from_row(&record, idx));
    }
    Ok(items)
}

fn item_from_row(record: &csv::StringRecord, idx: usize) -> WorkItem {
    let field = |col: usize| record.get(col).unwrap_or("").trim().to_string();

    let mut label = field(COL_LABEL);
    if label.is_empty() {
        label = format!("record-{}", idx + 1);
        warn!("row {} has no label, using '{}'", idx + 1, label);
    } else if !is_safe_label(&label) {
        let synthesized = format!("record-{}", idx + 1);
        warn!(
            "row {} label '{}' is not a safe file name, using '{}'",
            idx + 1,
            label,
            synthesized
        );
        label = synthesized;
    }

    WorkItem {
        label,
        article_id: field(COL_ARTICLE_ID),
        page_url: field(COL_PAGE_URL),
    }
}

/// The label names a scratch subdirectory and an output file, so it must be
/// a single plain path component.
fn is_safe_label(label: &str) -> bool {
    !label.contains(['/', '\\']) && label != "." && label != ".."
}
