//! Error types for the litharvest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HarvestError`] — **Fatal**: the run cannot start or a record's output
//!   cannot be written at all (missing credentials, malformed pattern file,
//!   unreadable worklist). Returned as `Err(HarvestError)` from the top-level
//!   entry points.
//!
//! * [`StageError`] — **Non-fatal**: a single element, archive, file, or page
//!   failed but the rest of the record is fine. These are caught at the
//!   narrowest possible scope, logged as warnings, and the stage continues
//!   with a degraded (empty/partial) result.
//!
//! The separation keeps the batch contract honest: the only hard failure mode
//! of a run is aborting before the first record is processed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the litharvest library.
///
/// Stage-local failures use [`StageError`] and are downgraded to log lines
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Startup / configuration errors ───────────────────────────────────
    /// Credentials file was not found at the given path.
    #[error("credentials file not found: '{path}'\nCreate a JSON file containing {{\"apikey\": \"...\"}}.")]
    CredentialsNotFound { path: PathBuf },

    /// Credentials file exists but could not be parsed or lacks the key.
    #[error("credentials file '{path}' is invalid: {detail}")]
    CredentialsInvalid { path: PathBuf, detail: String },

    /// Pattern file was not found at the given path.
    #[error("pattern file not found: '{path}'")]
    PatternFileNotFound { path: PathBuf },

    /// Pattern file is not valid JSON or lacks the `dynamic_patterns` key.
    #[error("pattern file '{path}' is invalid: {detail}")]
    PatternFileInvalid { path: PathBuf, detail: String },

    /// Worklist file could not be opened or parsed at all.
    #[error("failed to read worklist '{path}': {detail}")]
    WorklistUnreadable { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ───────────────────────────────────────────────────────
    /// Could not create or write a consolidated output file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create a record's scratch directory.
    #[error("failed to create scratch directory '{path}': {source}")]
    ScratchCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to one element, file, archive, or page.
///
/// Every variant is logged and skipped where it occurs; none of them may
/// abort the record, let alone the batch.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// One page element could not be activated or read.
    #[error("element under rule '{rule}' failed: {detail}")]
    Element { rule: String, detail: String },

    /// The render session itself failed (navigation, script, protocol).
    #[error("page session error: {detail}")]
    Session { detail: String },

    /// A fetched file could not be downloaded or written.
    #[error("download of '{url}' failed: {detail}")]
    Download { url: String, detail: String },

    /// An archive is damaged and could not be expanded.
    #[error("archive '{path}' is corrupt: {detail}")]
    ArchiveCorrupt { path: PathBuf, detail: String },

    /// An office document could not be converted to PDF.
    #[error("conversion of '{path}' failed: {detail}")]
    Conversion { path: PathBuf, detail: String },

    /// One page of one document resisted text extraction.
    #[error("page {page} of '{path}' failed: {detail}")]
    PageExtraction {
        path: PathBuf,
        page: u32,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_not_found_display() {
        let e = HarvestError::CredentialsNotFound {
            path: PathBuf::from("/etc/refer/config.json"),
        };
        let msg = e.to_string();
        assert!(msg.contains("config.json"), "got: {msg}");
        assert!(msg.contains("apikey"), "got: {msg}");
    }

    #[test]
    fn element_error_names_the_rule() {
        let e = StageError::Element {
            rule: "supp_button".into(),
            detail: "stale element".into(),
        };
        assert!(e.to_string().contains("supp_button"));
    }

    #[test]
    fn page_extraction_display() {
        let e = StageError::PageExtraction {
            path: PathBuf::from("supp.pdf"),
            page: 7,
            detail: "bad stream".into(),
        };
        assert!(e.to_string().contains("page 7"));
        assert!(e.to_string().contains("supp.pdf"));
    }
}
