//! Per-record scratch directories.
//!
//! Each [`crate::worklist::WorkItem`] owns exactly one scratch directory for
//! the duration of its pipeline pass: downloads land there, archives expand
//! there, normalization reads from there. Removal consumes the value, so a
//! removed scratch area cannot be referenced again — the compiler enforces
//! the never-touch-after-removal invariant.

use crate::error::HarvestError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A filesystem workspace owned exclusively by one record's pipeline pass.
#[derive(Debug)]
pub struct ScratchArea {
    path: PathBuf,
}

impl ScratchArea {
    /// Create `<root>/<label>/`, including parents. Re-creating an existing
    /// directory is fine; leftovers from a crashed earlier run are reused.
    pub fn create(root: &Path, label: &str) -> Result<Self, HarvestError> {
        let path = root.join(label);
        std::fs::create_dir_all(&path).map_err(|source| HarvestError::ScratchCreateFailed {
            path: path.clone(),
            source,
        })?;
        debug!("scratch area ready: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the whole directory tree, consuming the area.
    ///
    /// Removal is best-effort: a failure is logged and swallowed, because
    /// cleanup must never abort a record that otherwise completed.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove scratch '{}': {}", self.path.display(), e);
            }
        } else {
            debug!("scratch area removed: {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_remove() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::create(root.path(), "REC1").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        std::fs::write(path.join("file.bin"), b"x").unwrap();

        scratch.remove();
        assert!(!path.exists());
    }

    #[test]
    fn remove_of_already_absent_dir_is_silent() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::create(root.path(), "REC2").unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        scratch.remove(); // must not panic
    }
}
