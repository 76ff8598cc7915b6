//! Pipeline stages for per-record acquisition and consolidation.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap capability
//! implementations (renderer, converter) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! retrieve ──▶ harvest ──▶ unpack ──▶ normalize ──▶ sanitize
//! (content API) (page+fetch) (zips)  (office/PDF→text) (boilerplate)
//! ```
//!
//! 1. [`retrieve`]  — article full text from the content API, or a typed
//!    "unavailable" result; never fails past its boundary
//! 2. [`harvest`]   — drive the render session over the extraction rules,
//!    fetching supplementary files into the scratch area
//! 3. [`unpack`]    — recursive archive expansion; runs in `spawn_blocking`
//!    because zip parsing is synchronous
//! 4. [`normalize`] — extension pre-filter, office→PDF conversion, per-page
//!    text and table extraction
//! 5. [`sanitize`]  — single-pass vendor-boilerplate removal plus whitespace
//!    normalization

pub mod harvest;
pub mod normalize;
pub mod retrieve;
pub mod sanitize;
pub mod unpack;
