//! The batch driver: sequence every stage once per record.
//!
//! ## Failure isolation
//!
//! Records are processed strictly sequentially, and each one is a bulkhead:
//! a failure anywhere in the supplementary stages degrades that record to
//! empty supplementary content, the consolidated artifact is still written,
//! the scratch area is still removed, and the next record still runs. The
//! only error that ends the run is one raised before the first record — the
//! caller's configuration loading.
//!
//! ## Resource discipline
//!
//! The render session is scoped to one record and closed unconditionally
//! after harvesting. The office converter is shared across the whole run,
//! started lazily on first need, and shut down once on every exit path.
//! A fixed pacing delay follows every record regardless of outcome.

use crate::config::HarvestConfig;
use crate::consolidate::{consolidate, persist};
use crate::error::StageError;
use crate::office::{OfficeConverter, SofficeConverter};
use crate::output::{RecordOutcome, RunOutput, RunStats};
use crate::patterns::PatternStore;
use crate::pipeline::retrieve::FullTextRetriever;
use crate::pipeline::{harvest, normalize, unpack};
use crate::progress::{NoopProgress, RecordProgress};
use crate::render::{PageRenderer, WebDriverRenderer};
use crate::scratch::ScratchArea;
use crate::worklist::WorkItem;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Process every worklist item and return per-record outcomes.
///
/// Always produces exactly one outcome (and one best-effort artifact) per
/// item, even when every remote call fails.
pub async fn run(
    items: &[WorkItem],
    patterns: &PatternStore,
    config: &HarvestConfig,
) -> RunOutput {
    run_with_progress(items, patterns, config, &NoopProgress).await
}

/// [`run`] with a progress observer.
pub async fn run_with_progress(
    items: &[WorkItem],
    patterns: &PatternStore,
    config: &HarvestConfig,
    progress: &dyn RecordProgress,
) -> RunOutput {
    let run_start = Instant::now();
    info!("starting run over {} record(s)", items.len());
    progress.on_run_start(items.len());

    let retriever = FullTextRetriever::new(config);
    let http = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .unwrap_or_default();

    let renderer: Arc<dyn PageRenderer> = config.renderer.clone().unwrap_or_else(|| {
        Arc::new(WebDriverRenderer::new(
            config.webdriver_url.clone(),
            config.user_agent.clone(),
        ))
    });
    let converter: Arc<dyn OfficeConverter> = config.converter.clone().unwrap_or_else(|| {
        Arc::new(SofficeConverter::new(
            config.soffice_path.clone(),
            config.converter_warmup_ms,
        ))
    });

    let mut outcomes = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        progress.on_record_start(index, items.len(), &item.label);
        let outcome = process_record(
            item,
            patterns,
            config,
            &retriever,
            &http,
            renderer.as_ref(),
            converter.as_ref(),
        )
        .await;
        progress.on_record_complete(index, items.len(), &outcome);
        outcomes.push(outcome);

        // Pacing applies after every record, successful or not.
        tokio::time::sleep(Duration::from_millis(config.pacing_delay_ms)).await;
    }

    // The converter may never have started; shutdown is safe either way.
    converter.shutdown().await;

    let stats = summarize(&outcomes, run_start.elapsed());
    info!(
        "run complete: {}/{} records persisted ({} degraded, {} failed) in {}ms",
        stats.with_fulltext + stats.degraded,
        stats.total_records,
        stats.degraded,
        stats.failed,
        stats.total_duration_ms
    );
    progress.on_run_complete(stats.total_records, stats.failed);

    RunOutput { outcomes, stats }
}

/// Run the whole state machine for one record. Never returns an error: every
/// failure mode ends in a (possibly degraded) outcome.
async fn process_record(
    item: &WorkItem,
    patterns: &PatternStore,
    config: &HarvestConfig,
    retriever: &FullTextRetriever,
    http: &reqwest::Client,
    renderer: &dyn PageRenderer,
    converter: &dyn OfficeConverter,
) -> RecordOutcome {
    let start = Instant::now();
    info!("processing record '{}'", item.label);

    // ── Full text ────────────────────────────────────────────────────────
    let retrieved = retriever.retrieve(&item.article_id).await;
    if !retrieved.is_available() {
        debug!("record '{}': full text unavailable", item.label);
    }

    // ── Supplementary materials ──────────────────────────────────────────
    let mut files_fetched = 0usize;
    let mut supplementary = String::new();
    let mut record_error: Option<String> = None;

    match ScratchArea::create(&config.scratch_root, &item.label) {
        Ok(scratch) => {
            match collect_supplementary(
                item, patterns, config, http, renderer, converter, &scratch,
            )
            .await
            {
                Ok((fetched, text)) => {
                    files_fetched = fetched;
                    supplementary = text;
                }
                Err(e) => {
                    warn!("record '{}': supplementary stages aborted: {e}", item.label);
                    record_error = Some(e.to_string());
                }
            }
            // Unconditional: the scratch area must be gone whatever happened
            // above, including the empty-supplementary case.
            scratch.remove();
        }
        Err(e) => {
            warn!("record '{}': no scratch area: {e}", item.label);
            record_error = Some(e.to_string());
        }
    }

    // ── Consolidate & persist ────────────────────────────────────────────
    // Written exactly once per record, even with both halves empty.
    let record = consolidate(&item.label, retrieved.text(), &supplementary, &config.marker);
    let supplementary_chars = record.supplementary.len();
    let (output_path, error) = match persist(&record, &config.output_dir).await {
        Ok(path) => (Some(path), record_error),
        Err(e) => {
            warn!("record '{}': persist failed: {e}", item.label);
            (None, Some(e.to_string()))
        }
    };

    RecordOutcome {
        label: item.label.clone(),
        fulltext_available: retrieved.is_available(),
        files_fetched,
        supplementary_chars,
        output_path,
        error,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Harvest, unpack, filter, normalize. Best-effort within; an error here
/// degrades the record to empty supplementary content.
async fn collect_supplementary(
    item: &WorkItem,
    patterns: &PatternStore,
    config: &HarvestConfig,
    http: &reqwest::Client,
    renderer: &dyn PageRenderer,
    converter: &dyn OfficeConverter,
    scratch: &ScratchArea,
) -> Result<(usize, String), StageError> {
    let mut fetched = 0usize;

    if item.page_url.is_empty() {
        debug!("record '{}' has no page URL, skipping harvest", item.label);
    } else {
        match renderer.open(&item.page_url, scratch.path()).await {
            Ok(session) => {
                fetched = harvest::harvest(
                    session.as_ref(),
                    patterns.rules(),
                    scratch,
                    http,
                    config,
                )
                .await;
                // Release the session on this path and every other: the
                // harvest itself cannot fail.
                session.close().await;
            }
            Err(e) => {
                // Degraded, not fatal: the record still gets normalized
                // (possibly to nothing) and consolidated.
                warn!("record '{}': page render failed: {e}", item.label);
            }
        }
    }

    unpack::expand_all(scratch.path()).await?;
    let filtered = normalize::remove_unsupported(scratch.path());
    if filtered > 0 {
        debug!("record '{}': {filtered} unsupported file(s) removed", item.label);
    }
    normalize::convert_office_files(scratch.path(), converter).await;
    let text = normalize::extract_all(scratch.path()).await;

    Ok((fetched, text))
}

fn summarize(outcomes: &[RecordOutcome], elapsed: Duration) -> RunStats {
    let mut stats = RunStats {
        total_records: outcomes.len(),
        total_duration_ms: elapsed.as_millis() as u64,
        ..RunStats::default()
    };
    for outcome in outcomes {
        stats.files_fetched += outcome.files_fetched;
        if !outcome.persisted() {
            stats.failed += 1;
        } else if outcome.fulltext_available && outcome.error.is_none() {
            stats.with_fulltext += 1;
        } else {
            stats.degraded += 1;
        }
    }
    stats
}
