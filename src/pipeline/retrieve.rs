//! Full-text retrieval from the structured content API.
//!
//! The retriever never fails past its boundary: every outcome, including
//! transport errors and unreadable response bodies, becomes a well-formed
//! [`RetrievedContent`], so the driver always has something to consolidate.
//!
//! ## Field probing
//!
//! Full-text responses nest the text under varying shapes. Instead of ad hoc
//! branching, the resolver tries an ordered list of field paths and takes the
//! first present value:
//!
//! 1. `full-text-retrieval-response.originalText`
//! 2. `full-text-retrieval-response.originalTextHtml`
//! 3. `originalText`
//! 4. `originalTextHtml`
//!
//! A resolved value that is itself an object carries its text in `$`; when
//! even that is absent, the object is serialized verbatim (and flagged in the
//! log) rather than dropped.

use crate::config::HarvestConfig;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one full-text retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievedContent {
    /// The article body, as returned by the API.
    Text(String),
    /// No text could be obtained; the reason is for the log only.
    Unavailable(String),
}

impl RetrievedContent {
    /// The text, or empty when unavailable.
    pub fn text(&self) -> &str {
        match self {
            RetrievedContent::Text(t) => t,
            RetrievedContent::Unavailable(_) => "",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RetrievedContent::Text(_))
    }
}

/// Client for the remote content-retrieval capability.
pub struct FullTextRetriever {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FullTextRetriever {
    pub fn new(config: &HarvestConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Retrieve the article text for `article_id`.
    ///
    /// An empty identifier short-circuits to `Unavailable` without touching
    /// the network.
    pub async fn retrieve(&self, article_id: &str) -> RetrievedContent {
        let article_id = article_id.trim();
        if article_id.is_empty() {
            return RetrievedContent::Unavailable("no identifier".into());
        }

        let url = format!("{}/{}", self.base_url, article_id);
        debug!("retrieving full text: {url}");

        let response = match self
            .client
            .get(&url)
            .header("X-ELS-APIKey", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return RetrievedContent::Unavailable(format!("request failed: {e}")),
        };

        if !response.status().is_success() {
            return RetrievedContent::Unavailable(format!("HTTP {}", response.status()));
        }

        let document: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return RetrievedContent::Unavailable(format!("unreadable document: {e}")),
        };

        match extract_full_text(&document) {
            Some(text) => {
                info!("full text obtained for '{article_id}' ({} chars)", text.len());
                RetrievedContent::Text(text)
            }
            None => RetrievedContent::Unavailable("no full-text field present".into()),
        }
    }
}

/// Ordered field paths probed for the article text.
const TEXT_FIELD_PATHS: [&[&str]; 4] = [
    &["full-text-retrieval-response", "originalText"],
    &["full-text-retrieval-response", "originalTextHtml"],
    &["originalText"],
    &["originalTextHtml"],
];

/// Resolve the article text from a response document. First present path
/// wins; absence of all four yields `None`, as does a present field holding
/// `null` or an empty string — those carry no text to consolidate.
pub fn extract_full_text(document: &Value) -> Option<String> {
    let value = TEXT_FIELD_PATHS
        .iter()
        .find_map(|path| lookup_path(document, path))?;

    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => match map.get("$").and_then(Value::as_str) {
            Some(text) => Some(text.to_string()),
            None => {
                warn!("full-text value has unexpected shape, serializing verbatim");
                Some(Value::Object(map.clone()).to_string())
            }
        },
        other => Some(other.to_string()),
    }
}

fn lookup_path<'a>(document: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |node, key| node.as_object()?.get(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_identifier_short_circuits() {
        // base_url is unroutable; an empty id must never reach it.
        let config = HarvestConfig::builder()
            .api_key("k")
            .api_base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let retriever = FullTextRetriever::new(&config);
        let result = retriever.retrieve("   ").await;
        assert_eq!(result, RetrievedContent::Unavailable("no identifier".into()));
    }

    #[test]
    fn nested_original_text_wins() {
        let doc = json!({
            "full-text-retrieval-response": {
                "originalText": "nested text",
                "originalTextHtml": "nested html"
            },
            "originalText": "top text"
        });
        assert_eq!(extract_full_text(&doc).as_deref(), Some("nested text"));
    }

    #[test]
    fn nested_html_beats_top_level() {
        let doc = json!({
            "full-text-retrieval-response": { "originalTextHtml": "nested html" },
            "originalText": "top text"
        });
        assert_eq!(extract_full_text(&doc).as_deref(), Some("nested html"));
    }

    #[test]
    fn top_level_html_only_is_found() {
        // No wrapper, no originalText: the fourth probe must still hit.
        let doc = json!({ "originalTextHtml": "<p>body</p>" });
        assert_eq!(extract_full_text(&doc).as_deref(), Some("<p>body</p>"));
    }

    #[test]
    fn object_value_uses_dollar_field() {
        let doc = json!({ "originalText": { "$": "the text", "lang": "en" } });
        assert_eq!(extract_full_text(&doc).as_deref(), Some("the text"));
    }

    #[test]
    fn object_without_dollar_serialized_verbatim() {
        let doc = json!({ "originalText": { "xocs:doc": "deep" } });
        let out = extract_full_text(&doc).unwrap();
        assert!(out.contains("xocs:doc"));
        assert!(out.contains("deep"));
    }

    #[test]
    fn absence_of_all_fields_is_none() {
        let doc = json!({ "coredata": {} });
        assert_eq!(extract_full_text(&doc), None);
    }

    #[test]
    fn null_field_is_unavailable_not_the_literal_null() {
        let doc = json!({
            "full-text-retrieval-response": { "originalText": null }
        });
        assert_eq!(extract_full_text(&doc), None);
    }

    #[test]
    fn empty_string_field_is_unavailable() {
        let doc = json!({ "originalText": "" });
        assert_eq!(extract_full_text(&doc), None);
    }

    #[test]
    fn retrieved_content_text_accessor() {
        assert_eq!(RetrievedContent::Text("a".into()).text(), "a");
        assert_eq!(RetrievedContent::Unavailable("x".into()).text(), "");
    }
}
