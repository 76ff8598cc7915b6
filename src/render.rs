//! Page rendering capability: the narrow interface the harvester drives.
//!
//! The pipeline never talks to a browser directly; it goes through
//! [`PageRenderer`] / [`PageSession`], so the core stays testable with a fake
//! session (the integration tests ship one whose `click` drops a file into
//! the download directory, modeling the browser-download side effect).
//!
//! The shipped implementation, [`WebDriverRenderer`], speaks the WebDriver
//! wire protocol over HTTP to a chromedriver endpoint: headless Chrome with
//! automation flags suppressed and the per-record scratch directory set as
//! the browser download location. One session is opened per record and
//! released unconditionally after harvesting.

use crate::error::StageError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How long to wait for the document body after navigation.
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Opaque handle to one located page element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
}

/// One rendered page, scoped to one record.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Scroll to the end of the page once.
    async fn scroll_to_end(&self) -> Result<(), StageError>;

    /// Locate all elements matching an XPath locator.
    async fn find_elements(&self, locator: &str) -> Result<Vec<ElementHandle>, StageError>;

    /// Activate an element in page context.
    async fn click(&self, element: &ElementHandle) -> Result<(), StageError>;

    /// Read an element attribute, `None` when absent.
    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, StageError>;

    /// Release the session. Must be safe to call exactly once on every exit
    /// path; failures are logged, never propagated.
    async fn close(&self);
}

/// Factory for per-record page sessions.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Open `url` with downloads routed into `download_dir`.
    async fn open(&self, url: &str, download_dir: &Path)
        -> Result<Box<dyn PageSession>, StageError>;
}

// ── WebDriver implementation ─────────────────────────────────────────────

/// [`PageRenderer`] over the WebDriver wire protocol (chromedriver).
pub struct WebDriverRenderer {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl WebDriverRenderer {
    /// `base_url` is the chromedriver endpoint, e.g. `http://localhost:9515`.
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    fn session_payload(&self, download_dir: &Path) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            "--headless",
                            "--disable-gpu",
                            "--no-sandbox",
                            "--disable-dev-shm-usage",
                            "--disable-blink-features=AutomationControlled",
                            format!("--user-agent={}", self.user_agent),
                        ],
                        "excludeSwitches": ["enable-logging"],
                        "prefs": {
                            "download.default_directory": download_dir.display().to_string(),
                            "download.prompt_for_download": false,
                            "download.directory_upgrade": true,
                            "safebrowsing.enabled": true,
                            "profile.default_content_setting_values.automatic_downloads": 1,
                        }
                    }
                }
            }
        })
    }
}

fn session_err(detail: impl std::fmt::Display) -> StageError {
    StageError::Session {
        detail: detail.to_string(),
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn open(
        &self,
        url: &str,
        download_dir: &Path,
    ) -> Result<Box<dyn PageSession>, StageError> {
        let response: Value = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&self.session_payload(download_dir))
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?
            .json()
            .await
            .map_err(session_err)?;

        let session_id = response
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| session_err("no sessionId in response"))?
            .to_string();

        let session = WebDriverSession {
            client: self.client.clone(),
            base_url: format!("{}/session/{}", self.base_url, session_id),
        };

        session.navigate(url).await?;
        session.await_body().await?;
        Ok(Box::new(session))
    }
}

struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
}

impl WebDriverSession {
    async fn command(&self, path: &str, body: Value) -> Result<Value, StageError> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?
            .json()
            .await
            .map_err(session_err)
    }

    async fn navigate(&self, url: &str) -> Result<(), StageError> {
        debug!("navigating to {url}");
        self.command("/url", json!({ "url": url })).await?;
        Ok(())
    }

    /// Poll for the document body, the same readiness signal the original
    /// page-load wait used.
    async fn await_body(&self) -> Result<(), StageError> {
        let deadline = tokio::time::Instant::now() + PAGE_LOAD_TIMEOUT;
        loop {
            if !self.find_elements("//body").await?.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(session_err("page body never appeared"));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn scroll_to_end(&self) -> Result<(), StageError> {
        self.command(
            "/execute/sync",
            json!({
                "script": "window.scrollTo(0, document.body.scrollHeight);",
                "args": []
            }),
        )
        .await?;
        Ok(())
    }

    async fn find_elements(&self, locator: &str) -> Result<Vec<ElementHandle>, StageError> {
        let response = self
            .command("/elements", json!({ "using": "xpath", "value": locator }))
            .await?;

        let handles = response
            .pointer("/value")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|el| el.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(|id| ElementHandle { id: id.to_string() })
                    .collect()
            })
            .unwrap_or_default();
        Ok(handles)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), StageError> {
        // Script click instead of the element click endpoint: overlays and
        // sticky headers on publisher pages intercept native clicks.
        self.command(
            "/execute/sync",
            json!({
                "script": "arguments[0].click();",
                "args": [{ ELEMENT_KEY: element.id }]
            }),
        )
        .await?;
        Ok(())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, StageError> {
        let response: Value = self
            .client
            .get(format!(
                "{}/element/{}/attribute/{}",
                self.base_url, element.id, name
            ))
            .send()
            .await
            .map_err(session_err)?
            .error_for_status()
            .map_err(session_err)?
            .json()
            .await
            .map_err(session_err)?;

        Ok(response
            .pointer("/value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn close(&self) {
        if let Err(e) = self.client.delete(&self.base_url).send().await {
            warn!("failed to close render session: {e}");
        }
    }
}
