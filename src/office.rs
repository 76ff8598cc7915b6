//! Office-document conversion capability.
//!
//! Normalization needs `.doc`/`.docx` files turned into PDFs before any text
//! can come out of them. That work is delegated to an external converter
//! process behind the [`OfficeConverter`] trait, so the pipeline core can be
//! exercised with a fake in tests.
//!
//! The shipped implementation shells out to LibreOffice. The converter is a
//! process-wide resource: started lazily on first need, not torn down between
//! files, and shut down once when the run ends. LibreOffice exposes no
//! readiness signal, so startup is followed by a fixed warm-up sleep.

use crate::error::StageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// External office-to-PDF conversion capability.
#[async_trait]
pub trait OfficeConverter: Send + Sync {
    /// Start the converter if it is not already running. Idempotent.
    async fn ensure_started(&self) -> Result<(), StageError>;

    /// Convert one office document; the PDF lands next to the input file.
    /// Returns the path of the produced PDF.
    async fn convert_to_pdf(&self, file: &Path) -> Result<PathBuf, StageError>;

    /// Stop the converter. Safe to call without a prior start and called
    /// unconditionally when the run ends; failures are logged, not raised.
    async fn shutdown(&self);
}

/// [`OfficeConverter`] backed by a headless LibreOffice (`soffice`).
pub struct SofficeConverter {
    soffice_path: PathBuf,
    warmup: Duration,
    listener: Mutex<Option<Child>>,
}

impl SofficeConverter {
    pub fn new(soffice_path: impl Into<PathBuf>, warmup_ms: u64) -> Self {
        Self {
            soffice_path: soffice_path.into(),
            warmup: Duration::from_millis(warmup_ms),
            listener: Mutex::new(None),
        }
    }

    fn conversion_err(file: &Path, detail: impl std::fmt::Display) -> StageError {
        StageError::Conversion {
            path: file.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

#[async_trait]
impl OfficeConverter for SofficeConverter {
    async fn ensure_started(&self) -> Result<(), StageError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }

        info!("starting office converter: {}", self.soffice_path.display());
        let child = Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--accept=socket,host=localhost,port=2002;urp;StarOffice.ComponentContext")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StageError::Conversion {
                path: self.soffice_path.clone(),
                detail: format!("failed to launch: {e}"),
            })?;
        *listener = Some(child);
        drop(listener);

        // No readiness protocol exists; converting before the warm-up
        // completes yields spurious per-file failures.
        tokio::time::sleep(self.warmup).await;
        Ok(())
    }

    async fn convert_to_pdf(&self, file: &Path) -> Result<PathBuf, StageError> {
        let out_dir = file
            .parent()
            .ok_or_else(|| Self::conversion_err(file, "file has no parent directory"))?;

        debug!("converting {} to PDF", file.display());
        let status = Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Self::conversion_err(file, e))?;

        if !status.success() {
            return Err(Self::conversion_err(
                file,
                format!("converter exited with {status}"),
            ));
        }

        let pdf = file.with_extension("pdf");
        if !pdf.exists() {
            return Err(Self::conversion_err(file, "converter produced no PDF"));
        }
        Ok(pdf)
    }

    async fn shutdown(&self) {
        let mut listener = self.listener.lock().await;
        if let Some(mut child) = listener.take() {
            if let Err(e) = child.kill().await {
                warn!("failed to stop office converter: {e}");
            } else {
                debug!("office converter stopped");
            }
        }
    }
}
