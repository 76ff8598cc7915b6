//! Format normalization: get plain text out of whatever the harvest left.
//!
//! Three passes over the scratch area, in order:
//!
//! 1. **Pre-filter** — delete every file whose extension is not one of
//!    `pdf`, `doc`, `docx`, so the later passes only ever see relevant
//!    inputs.
//! 2. **Office conversion** — each `.doc`/`.docx` becomes a sibling PDF via
//!    the injected [`OfficeConverter`]; per-file failures are logged and do
//!    not abort the remaining files.
//! 3. **Extraction** — each `.pdf` is opened and, page by page, its text is
//!    pulled out. Lines that look columnar (two or more multi-space gaps)
//!    are additionally re-rendered as simple `|`-separated rows appended
//!    after the page's text. A failing page is skipped, not the document.
//!
//! File enumeration is sorted by path so the concatenated output is
//! deterministic for a given scratch tree.

use crate::error::StageError;
use crate::office::OfficeConverter;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions allowed past the pre-filter.
const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

/// Delete every file in the scratch tree whose extension is not allowed.
/// Returns the number of files removed.
pub fn remove_unsupported(scratch_dir: &Path) -> usize {
    let mut removed = 0usize;
    for path in walk_files(scratch_dir) {
        let allowed = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ALLOWED_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)));
        if !allowed {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("filtered out '{}'", path.display());
                    removed += 1;
                }
                Err(e) => warn!("failed to delete '{}': {e}", path.display()),
            }
        }
    }
    removed
}

/// Convert every office document in the scratch tree to PDF.
///
/// The converter is started lazily: a scratch area without office files
/// never launches the external process.
pub async fn convert_office_files(scratch_dir: &Path, converter: &dyn OfficeConverter) -> usize {
    let office_files: Vec<PathBuf> = walk_files(scratch_dir)
        .into_iter()
        .filter(|p| has_any_extension(p, &["doc", "docx"]))
        .collect();
    if office_files.is_empty() {
        return 0;
    }

    if let Err(e) = converter.ensure_started().await {
        warn!("office converter unavailable, skipping {} file(s): {e}", office_files.len());
        return 0;
    }

    let mut converted = 0usize;
    for file in office_files {
        match converter.convert_to_pdf(&file).await {
            Ok(pdf) => {
                debug!("converted '{}' -> '{}'", file.display(), pdf.display());
                converted += 1;
            }
            Err(e) => warn!("{e}"),
        }
    }
    converted
}

/// Extract text (and simple table markup) from every PDF in the scratch
/// tree, concatenated in sorted path order.
pub async fn extract_all(scratch_dir: &Path) -> String {
    let pdfs: Vec<PathBuf> = walk_files(scratch_dir)
        .into_iter()
        .filter(|p| has_any_extension(p, &["pdf"]))
        .collect();

    let mut parts: Vec<String> = Vec::with_capacity(pdfs.len());
    for pdf in pdfs {
        let path = pdf.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_document(&path)).await;
        match extracted {
            Ok(Ok(text)) if !text.is_empty() => parts.push(text),
            Ok(Ok(_)) => debug!("'{}' yielded no text", pdf.display()),
            Ok(Err(e)) => warn!("{e}"),
            Err(e) => warn!("extraction task for '{}' panicked: {e}", pdf.display()),
        }
    }

    info!("normalized {} document(s)", parts.len());
    parts.join("\n")
}

/// Extract one PDF, page by page. Page failures are logged and skipped.
fn extract_document(path: &Path) -> Result<String, StageError> {
    let document = Document::load(path).map_err(|e| StageError::PageExtraction {
        path: path.to_path_buf(),
        page: 0,
        detail: format!("cannot open document: {e}"),
    })?;

    let mut pages_out: Vec<String> = Vec::new();
    for (page_number, _) in document.get_pages() {
        match document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                pages_out.push(render_page(page_number, &text));
            }
            Ok(_) => {}
            Err(e) => {
                let err = StageError::PageExtraction {
                    path: path.to_path_buf(),
                    page: page_number,
                    detail: e.to_string(),
                };
                warn!("{err}");
            }
        }
    }
    Ok(pages_out.join("\n"))
}

/// Render one page: heading, raw text, then any columnar lines re-rendered
/// as `|`-separated rows.
fn render_page(page_number: u32, text: &str) -> String {
    let mut out = format!("## Page {page_number}\n{}\n", text.trim());

    let rows: Vec<String> = text
        .lines()
        .filter_map(columnar_cells)
        .map(|cells| format!("| {} |", cells.join(" | ")))
        .collect();
    if !rows.is_empty() {
        out.push_str(&rows.join("\n"));
        out.push('\n');
    }
    out
}

/// Split a line on runs of two or more spaces; a "tabular" line has at least
/// three cells (two or more gaps).
fn columnar_cells(line: &str) -> Option<Vec<&str>> {
    let cells: Vec<&str> = line
        .trim()
        .split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if cells.len() >= 3 {
        Some(cells)
    } else {
        None
    }
}

/// All regular files under `dir`, recursively, sorted by path.
pub fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_files(dir, &mut files);
    files.sort();
    files
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("cannot read '{}': {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files);
        } else {
            files.push(path);
        }
    }
}

fn has_any_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| wanted.iter().any(|w| e.eq_ignore_ascii_case(w)))
}
