//! Recursive archive expansion inside the scratch area.
//!
//! Supplementary bundles routinely nest: a zip of zips of documents. After
//! the top-level archives expand into the scratch root, the whole tree is
//! re-walked and any newly revealed archive expands into a sibling directory
//! named after its own stem, recursively, with no fixed depth limit (bounded
//! in practice by filesystem depth). Damaged or non-archive inputs are
//! reported and skipped; one bad archive never blocks its siblings.
//!
//! Zip parsing is synchronous, so everything here runs under
//! `spawn_blocking`.

use crate::error::StageError;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Expand every archive in the scratch area, recursively.
///
/// Top-level archives expand into `scratch_dir` itself; nested ones into
/// stem-named sibling directories.
pub async fn expand_all(scratch_dir: &Path) -> Result<(), StageError> {
    let dir = scratch_dir.to_path_buf();
    tokio::task::spawn_blocking(move || expand_all_blocking(&dir))
        .await
        .map_err(|e| StageError::ArchiveCorrupt {
            path: scratch_dir.to_path_buf(),
            detail: format!("expansion task panicked: {e}"),
        })?;
    Ok(())
}

fn expand_all_blocking(scratch_dir: &Path) {
    let mut expanded: HashSet<PathBuf> = HashSet::new();

    // Top level first, into the scratch root (download layout is flat).
    for archive in list_archives(scratch_dir, false) {
        expand_one(&archive, scratch_dir);
        expanded.insert(archive);
    }

    // Then keep walking the whole tree until no unexpanded archive remains.
    loop {
        let next: Vec<PathBuf> = list_archives(scratch_dir, true)
            .into_iter()
            .filter(|p| !expanded.contains(p))
            .collect();
        if next.is_empty() {
            break;
        }
        for archive in next {
            let destination = archive.with_extension("");
            if let Err(e) = std::fs::create_dir_all(&destination) {
                warn!("cannot create '{}': {e}", destination.display());
                expanded.insert(archive);
                continue;
            }
            expand_one(&archive, &destination);
            expanded.insert(archive);
        }
    }
}

/// Expand a single archive into `destination`.
///
/// Non-archives are a warning no-op; corrupt archives and corrupt entries
/// are logged and skipped.
pub fn expand_one(archive_path: &Path, destination: &Path) {
    let file = match File::open(archive_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("cannot open '{}': {e}", archive_path.display());
            return;
        }
    };

    let mut archive = match ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => {
            warn!(
                "'{}' is not a valid archive, skipping expansion: {e}",
                archive_path.display()
            );
            return;
        }
    };

    let mut extracted = 0usize;
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    "corrupt entry {index} in '{}': {e}",
                    archive_path.display()
                );
                continue;
            }
        };

        // enclosed_name rejects entries that would escape the destination.
        let Some(relative) = entry.enclosed_name() else {
            warn!(
                "entry {index} in '{}' has an unsafe path, skipped",
                archive_path.display()
            );
            continue;
        };
        let target = destination.join(relative);

        let result = if entry.is_dir() {
            std::fs::create_dir_all(&target)
        } else {
            target
                .parent()
                .map(std::fs::create_dir_all)
                .unwrap_or(Ok(()))
                .and_then(|()| {
                    let mut out = File::create(&target)?;
                    std::io::copy(&mut entry, &mut out).map(|_| ())
                })
        };

        match result {
            Ok(()) => extracted += 1,
            Err(e) => warn!(
                "failed to extract '{}' from '{}': {e}",
                target.display(),
                archive_path.display()
            ),
        }
    }

    debug!(
        "expanded '{}' into '{}' ({extracted} entries)",
        archive_path.display(),
        destination.display()
    );
}

/// Archives under `dir`; `recursive` controls whether subdirectories are
/// walked. Sorted for deterministic processing order.
fn list_archives(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_archives(dir, recursive, &mut found);
    found.sort();
    found
}

fn collect_archives(dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) {
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
            if recursive {
                collect_archives(&path, recursive, found);
            }
        } else if has_extension(&path, "zip") {
            found.push(path);
        }
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_zip(target: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(target).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn expands_three_levels_deep() {
        let dir = tempfile::tempdir().unwrap();

        // inner.zip contains a document
        let inner = dir.path().join("inner.zip");
        make_zip(&inner, &[("deep.pdf", b"%PDF-stub")]);

        // middle.zip contains inner.zip
        let middle = dir.path().join("middle.zip");
        make_zip(&middle, &[("inner.zip", &std::fs::read(&inner).unwrap())]);

        // outer.zip contains middle.zip; only outer remains in scratch
        let outer = dir.path().join("outer.zip");
        make_zip(&outer, &[("middle.zip", &std::fs::read(&middle).unwrap())]);
        std::fs::remove_file(&inner).unwrap();
        std::fs::remove_file(&middle).unwrap();

        expand_all(dir.path()).await.unwrap();

        // outer expanded into scratch root, then nested ones into stem dirs
        assert!(dir.path().join("middle.zip").exists());
        assert!(dir
            .path()
            .join("middle")
            .join("inner")
            .join("deep.pdf")
            .exists());
    }

    #[tokio::test]
    async fn corrupt_archive_does_not_block_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.zip"), b"definitely not a zip").unwrap();
        make_zip(&dir.path().join("good.zip"), &[("ok.docx", b"doc bytes")]);

        expand_all(dir.path()).await.unwrap();
        assert!(dir.path().join("ok.docx").exists());
    }

    #[test]
    fn non_archive_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("notes.zip");
        std::fs::write(&fake, b"plain text").unwrap();
        expand_one(&fake, dir.path());
        // nothing extracted, file untouched
        assert_eq!(std::fs::read(&fake).unwrap(), b"plain text");
    }
}
