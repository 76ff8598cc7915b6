//! # litharvest
//!
//! Batch acquisition of scholarly article text: manuscript full text from a
//! content API, supplementary files from the publisher's article page, all
//! merged into one plain-text artifact per record.
//!
//! ## Why this crate?
//!
//! Publisher APIs only serve the manuscript body; the supplementary
//! materials (datasets, appendices, extra figures) live behind
//! JavaScript-rendered download widgets on the article page. Getting the
//! *whole* article therefore needs two very different acquisition paths plus
//! a normalization layer that turns whatever arrives — nested zips, Word
//! documents, PDFs — into text. This crate runs both paths per record and
//! tolerates partial failure everywhere: a dead API, a missing page, or a
//! corrupt archive degrades the record, never the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! worklist row
//!  │
//!  ├─ 1. Retrieve   full text from the content API (probed JSON fields)
//!  ├─ 2. Harvest    rendered article page: scroll, trigger, direct links
//!  ├─ 3. Unpack     recursive zip expansion into the scratch area
//!  ├─ 4. Filter     drop everything but .pdf / .doc / .docx
//!  ├─ 5. Normalize  office → PDF (soffice), PDF → text (per page, lopdf)
//!  ├─ 6. Sanitize   strip vendor boilerplate span, collapse whitespace
//!  └─ 7. Persist    atomic write of <label>.txt (Manuscript + Supplementary)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use litharvest::{run, ApiCredentials, HarvestConfig, PatternStore};
//! use litharvest::worklist::load_worklist;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let creds = ApiCredentials::load("config.json")?;
//!     let config = HarvestConfig::builder().api_key(creds.api_key).build()?;
//!     let patterns = PatternStore::load("patterns.json")?;
//!     let items = load_worklist("worklist.csv")?;
//!
//!     let output = run(&items, &patterns, &config).await;
//!     for outcome in &output.outcomes {
//!         println!("{}: {:?}", outcome.label, outcome.output_path);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `litharvest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding the library:
//! ```toml
//! litharvest = { version = "0.1", default-features = false }
//! ```
//!
//! ## External processes
//!
//! The default capability implementations shell out to two locally installed
//! programs: a WebDriver endpoint (chromedriver on port 9515) for page
//! rendering and LibreOffice (`soffice`) for office-to-PDF conversion. Both
//! are injectable via [`HarvestConfig`] for testing or substitution.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod consolidate;
pub mod error;
pub mod office;
pub mod output;
pub mod patterns;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod run;
pub mod scratch;
pub mod worklist;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiCredentials, HarvestConfig, HarvestConfigBuilder};
pub use consolidate::{consolidate, persist, ConsolidatedRecord};
pub use error::{HarvestError, StageError};
pub use office::{OfficeConverter, SofficeConverter};
pub use output::{RecordOutcome, RunOutput, RunStats};
pub use patterns::{ActionKind, ExtractionRule, PatternStore};
pub use progress::{NoopProgress, RecordProgress};
pub use render::{ElementHandle, PageRenderer, PageSession, WebDriverRenderer};
pub use run::{run, run_with_progress};
pub use worklist::{load_worklist, WorkItem};
