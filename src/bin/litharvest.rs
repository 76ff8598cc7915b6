//! CLI binary for litharvest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `HarvestConfig` and prints per-record results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use litharvest::{
    load_worklist, run_with_progress, ApiCredentials, HarvestConfig, PatternStore, RecordOutcome,
    RecordProgress,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal progress observer: one bar over the worklist plus a per-record
/// log line as each record completes.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} records  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Harvesting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl RecordProgress for CliProgress {
    fn on_run_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting run over {total} record(s)…"))
        ));
    }

    fn on_record_start(&self, _index: usize, _total: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_record_complete(&self, _index: usize, _total: usize, outcome: &RecordOutcome) {
        let tick = if !outcome.persisted() {
            red("✗")
        } else if outcome.error.is_some() || !outcome.fulltext_available {
            cyan("⚠")
        } else {
            green("✓")
        };

        let detail = match &outcome.error {
            Some(e) if !outcome.persisted() => red(e),
            Some(e) => dim(e),
            None => dim(&format!(
                "{} file(s), {} chars supplementary",
                outcome.files_fetched, outcome.supplementary_chars
            )),
        };

        self.bar.println(format!(
            "  {} {:<24} {:<8} {}",
            tick,
            outcome.label,
            dim(&format!("{:.1}s", outcome.duration_ms as f64 / 1000.0)),
            detail,
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} record(s) processed",
                green("✔"),
                bold(&total.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} record(s) processed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a worklist with defaults (config.json, patterns.json, ./output)
  litharvest worklist.csv

  # Custom output and scratch locations
  litharvest worklist.csv -o results/ --scratch-root /tmp/litharvest

  # Point at a remote chromedriver and a non-default soffice
  litharvest worklist.csv --webdriver-url http://127.0.0.1:4444 \
      --soffice-path /opt/libreoffice/program/soffice

  # Slow down pacing between records to 3 seconds
  litharvest worklist.csv --pacing-ms 3000

  # Machine-readable per-record report
  litharvest worklist.csv --json > report.json

WORKLIST FORMAT:
  CSV with a header row. Per row: column 1 is the record label (output file
  stem), column 12 the article identifier for the content API, column 13 the
  article page URL for supplementary harvesting. Other columns are ignored.

PATTERN FORMAT:
  JSON object with a "dynamic_patterns" key mapping names to XPath locators.
  Locators ending in "button" are clicked (download triggers); locators
  ending in "a" have their href fetched directly. Anything else is skipped.

PREREQUISITES:
  chromedriver listening on the --webdriver-url endpoint (default :9515)
  LibreOffice (`soffice`) on PATH for .doc/.docx conversion
"#;

/// Fetch scholarly article text plus supplementary files, per worklist row.
#[derive(Parser, Debug)]
#[command(
    name = "litharvest",
    version,
    about = "Fetch scholarly article full text and supplementary files into per-record artifacts",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// CSV worklist: one article per row.
    worklist: PathBuf,

    /// Directory for consolidated `<label>.txt` artifacts.
    #[arg(short, long, env = "LITHARVEST_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Root directory for per-record scratch areas.
    #[arg(long, env = "LITHARVEST_SCRATCH", default_value = "scratch")]
    scratch_root: PathBuf,

    /// JSON credentials file carrying the content API key.
    #[arg(short, long, env = "LITHARVEST_CREDENTIALS", default_value = "config.json")]
    credentials: PathBuf,

    /// JSON pattern file with XPath locators for supplementary downloads.
    #[arg(short, long, env = "LITHARVEST_PATTERNS", default_value = "patterns.json")]
    patterns: PathBuf,

    /// Content API base URL.
    #[arg(long, env = "LITHARVEST_API_URL")]
    api_url: Option<String>,

    /// WebDriver endpoint for page rendering.
    #[arg(long, env = "LITHARVEST_WEBDRIVER", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Path to the LibreOffice binary.
    #[arg(long, env = "LITHARVEST_SOFFICE", default_value = "soffice")]
    soffice_path: String,

    /// Vendor marker whose first delimited span is stripped from output.
    #[arg(long, env = "LITHARVEST_MARKER", default_value = "Elsevier")]
    marker: String,

    /// Delay between records, in milliseconds.
    #[arg(long, env = "LITHARVEST_PACING_MS", default_value_t = 1000)]
    pacing_ms: u64,

    /// Per-file download timeout in seconds.
    #[arg(long, env = "LITHARVEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Content API request timeout in seconds.
    #[arg(long, env = "LITHARVEST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output the structured run report as JSON on stdout.
    #[arg(long, env = "LITHARVEST_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "LITHARVEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LITHARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LITHARVEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load inputs ──────────────────────────────────────────────────────
    let creds = ApiCredentials::load(&cli.credentials)
        .with_context(|| format!("Failed to load credentials from {:?}", cli.credentials))?;
    let patterns = PatternStore::load(&cli.patterns)
        .with_context(|| format!("Failed to load patterns from {:?}", cli.patterns))?;
    let items = load_worklist(&cli.worklist)
        .with_context(|| format!("Failed to read worklist {:?}", cli.worklist))?;

    if items.is_empty() {
        anyhow::bail!("Worklist {:?} contains no rows", cli.worklist);
    }

    let config = build_config(&cli, creds)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let progress: Arc<dyn RecordProgress> = if show_progress {
        CliProgress::new()
    } else {
        Arc::new(litharvest::NoopProgress)
    };

    let output = run_with_progress(&items, &patterns, &config, progress.as_ref()).await;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialise run report")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    } else if !cli.quiet && !show_progress {
        // Inline summary only when the progress observer printed nothing.
        eprintln!(
            "Processed {}/{} record(s) in {}ms ({} degraded, {} failed)",
            output.stats.total_records - output.stats.failed,
            output.stats.total_records,
            output.stats.total_duration_ms,
            output.stats.degraded,
            output.stats.failed,
        );
    } else if !cli.quiet {
        eprintln!(
            "   {} file(s) fetched  —  {}ms total  →  {}",
            dim(&output.stats.files_fetched.to_string()),
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    if output.stats.failed == output.stats.total_records {
        anyhow::bail!("Every record failed to persist");
    }

    Ok(())
}

/// Map CLI args to `HarvestConfig`.
fn build_config(cli: &Cli, creds: ApiCredentials) -> Result<HarvestConfig> {
    let mut builder = HarvestConfig::builder()
        .api_key(creds.api_key)
        .output_dir(cli.output.clone())
        .scratch_root(cli.scratch_root.clone())
        .marker(cli.marker.clone())
        .pacing_delay_ms(cli.pacing_ms)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .webdriver_url(cli.webdriver_url.clone())
        .soffice_path(cli.soffice_path.clone());

    if let Some(ref url) = cli.api_url {
        builder = builder.api_base_url(url.clone());
    }

    builder.build().context("Invalid configuration")
}
