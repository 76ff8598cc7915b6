//! Configuration types for a harvest run.
//!
//! All run behaviour is controlled through [`HarvestConfig`], built via its
//! [`HarvestConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to pass the configuration by reference to each stage and to diff two runs
//! to understand why their outputs differ. There is deliberately no
//! process-wide implicit state: the driver constructs one config and every
//! component borrows it.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::HarvestError;
use crate::office::OfficeConverter;
use crate::render::PageRenderer;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Browser user agent sent when rendering publisher pages.
///
/// Publisher sites serve a degraded page (or none at all) to obvious
/// automation user agents, so we present a current desktop Chrome string.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.6668.59 Safari/537.36";

/// Configuration for one harvest run.
///
/// Built via [`HarvestConfig::builder()`].
///
/// # Example
/// ```rust
/// use litharvest::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .api_key("secret")
///     .output_dir("./records")
///     .pacing_delay_ms(1500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Base URL of the full-text content API. Default: the Elsevier article
    /// endpoint. The article identifier is appended as a path segment.
    pub api_base_url: String,

    /// API key sent with every full-text request. Required; loaded from a
    /// credentials file via [`ApiCredentials::load`] in the CLI.
    pub api_key: String,

    /// Directory receiving one `<label>.txt` artifact per worklist row.
    /// Default: `./output`.
    pub output_dir: PathBuf,

    /// Root under which each record gets its own scratch subdirectory,
    /// named by label. Default: `./scratch`.
    pub scratch_root: PathBuf,

    /// Vendor boilerplate marker for the sanitizer. Default: `"Elsevier"`.
    ///
    /// The span from the first case-insensitive occurrence through the end of
    /// the second occurrence is removed from the consolidated text.
    pub marker: String,

    /// Delay after every record, successful or not, in milliseconds.
    /// Default: 1000.
    ///
    /// This bounds the request rate against both the content API and the
    /// publisher site; it applies regardless of outcome so a run of failing
    /// records cannot turn into a hammering loop.
    pub pacing_delay_ms: u64,

    /// Number of full-page scroll pulses applied after page load. Default: 5.
    ///
    /// Publisher pages lazy-load the supplementary panel; a bounded number of
    /// end-of-page scrolls forces it to materialize before rules run.
    pub scroll_pulses: u32,

    /// Settle delay between scroll pulses, in milliseconds. Default: 1000.
    pub scroll_settle_ms: u64,

    /// Settle delay after each trigger activation, in milliseconds.
    /// Default: 10_000.
    ///
    /// Triggered downloads are asynchronous and unobservable from the
    /// session; this wait is best-effort, not a completion guarantee.
    pub trigger_settle_ms: u64,

    /// Timeout for each direct-link file download, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for each full-text API call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Warm-up delay after launching the office converter, in milliseconds.
    /// Default: 5000. The converter exposes no readiness signal.
    pub converter_warmup_ms: u64,

    /// User agent for both the render session and direct-link downloads.
    pub user_agent: String,

    /// WebDriver endpoint used by the default renderer.
    /// Default: `http://localhost:9515` (chromedriver).
    pub webdriver_url: String,

    /// Path to the `soffice` executable used by the default converter.
    pub soffice_path: PathBuf,

    /// Pre-constructed page renderer. Takes precedence over `webdriver_url`.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Pre-constructed office converter. Takes precedence over `soffice_path`.
    pub converter: Option<Arc<dyn OfficeConverter>>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.elsevier.com/content/article/doi".to_string(),
            api_key: String::new(),
            output_dir: PathBuf::from("./output"),
            scratch_root: PathBuf::from("./scratch"),
            marker: "Elsevier".to_string(),
            pacing_delay_ms: 1000,
            scroll_pulses: 5,
            scroll_settle_ms: 1000,
            trigger_settle_ms: 10_000,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            converter_warmup_ms: 5000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            soffice_path: PathBuf::from("soffice"),
            renderer: None,
            converter: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("scratch_root", &self.scratch_root)
            .field("marker", &self.marker)
            .field("pacing_delay_ms", &self.pacing_delay_ms)
            .field("scroll_pulses", &self.scroll_pulses)
            .field("scroll_settle_ms", &self.scroll_settle_ms)
            .field("trigger_settle_ms", &self.trigger_settle_ms)
            .field("webdriver_url", &self.webdriver_url)
            .field("soffice_path", &self.soffice_path)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .field("converter", &self.converter.as_ref().map(|_| "<dyn OfficeConverter>"))
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = dir.into();
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.config.marker = marker.into();
        self
    }

    pub fn pacing_delay_ms(mut self, ms: u64) -> Self {
        self.config.pacing_delay_ms = ms;
        self
    }

    pub fn scroll_pulses(mut self, n: u32) -> Self {
        self.config.scroll_pulses = n;
        self
    }

    pub fn scroll_settle_ms(mut self, ms: u64) -> Self {
        self.config.scroll_settle_ms = ms;
        self
    }

    pub fn trigger_settle_ms(mut self, ms: u64) -> Self {
        self.config.trigger_settle_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn converter_warmup_ms(mut self, ms: u64) -> Self {
        self.config.converter_warmup_ms = ms;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.config.webdriver_url = url.into();
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn OfficeConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if c.api_key.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "API key must not be empty".into(),
            ));
        }
        if c.marker.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "sanitizer marker must not be empty".into(),
            ));
        }
        if c.api_base_url.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// API credentials loaded from a JSON file.
///
/// The file holds a single object with an `apikey` key; a missing file or a
/// missing/empty key is startup-fatal — the run never begins without a
/// usable secret.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
}

impl ApiCredentials {
    /// Load credentials from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarvestError::CredentialsNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                HarvestError::CredentialsInvalid {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }
            }
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| HarvestError::CredentialsInvalid {
                path: path.to_path_buf(),
                detail: format!("not valid JSON: {e}"),
            })?;

        let api_key = value
            .get("apikey")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HarvestError::CredentialsInvalid {
                path: path.to_path_buf(),
                detail: "missing or empty 'apikey' key".into(),
            })?;

        Ok(Self { api_key })
    }
}
