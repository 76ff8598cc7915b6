//! Extraction patterns: where supplementary-file controls live on a page.
//!
//! The pattern file is a JSON object with one recognized key,
//! `dynamic_patterns`, mapping a label to an XPath locator. The action a
//! locator implies is purely syntactic and resolved **once at load time**:
//! a locator ending in `button` is a [`ActionKind::Trigger`] (activate the
//! element and hope the browser downloads something), one ending in `a` is a
//! [`ActionKind::DirectLink`] (read its `href` and fetch it ourselves). Any
//! other suffix shape is rejected with a warning and skipped — a bad rule
//! never sinks the whole load.
//!
//! Rules are read-only after load and shared by reference across all records.

use crate::error::HarvestError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// What activating a matched element means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Click the element in page context; the download side effect is
    /// asynchronous and unobservable.
    Trigger,
    /// Read the element's `href` and fetch it directly.
    DirectLink,
}

/// One configured locator with its resolved action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Label from the pattern file, used in log lines.
    pub label: String,
    /// XPath expression selecting zero or more page elements.
    pub locator: String,
    /// Action resolved from the locator suffix at load time.
    pub action: ActionKind,
}

/// The loaded, immutable rule set.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    rules: Vec<ExtractionRule>,
}

#[derive(Deserialize)]
struct PatternFile {
    // BTreeMap keeps rule order stable across loads.
    dynamic_patterns: BTreeMap<String, String>,
}

impl PatternStore {
    /// Load the rule set from a JSON pattern file.
    ///
    /// A missing file, malformed JSON, or absent `dynamic_patterns` key is
    /// fatal. Individual rules with an unrecognized locator shape are logged
    /// and skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarvestError::PatternFileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                HarvestError::PatternFileInvalid {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }
            }
        })?;

        let file: PatternFile =
            serde_json::from_str(&raw).map_err(|e| HarvestError::PatternFileInvalid {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        Ok(Self::from_entries(file.dynamic_patterns))
    }

    /// Build a store from label → locator pairs, classifying each locator.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let rules = entries
            .into_iter()
            .filter_map(|(label, locator)| match classify(&locator) {
                Some(action) => Some(ExtractionRule {
                    label,
                    locator,
                    action,
                }),
                None => {
                    warn!("rule '{}' has unrecognized locator shape '{}', skipped", label, locator);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// The loaded rules, in stable label order.
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Classify a locator by its suffix.
fn classify(locator: &str) -> Option<ActionKind> {
    if locator.ends_with("button") {
        Some(ActionKind::Trigger)
    } else if locator.ends_with('a') {
        Some(ActionKind::DirectLink)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn classify_button_is_trigger() {
        assert_eq!(classify("//div[@id='supp']//button"), Some(ActionKind::Trigger));
    }

    #[test]
    fn classify_anchor_is_direct_link() {
        assert_eq!(classify("//span[@class='dl']/a"), Some(ActionKind::DirectLink));
    }

    #[test]
    fn classify_other_shapes_rejected() {
        assert_eq!(classify("//div[@id='supp']"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"dynamic_patterns": {{
                "supp_button": "//div[@id='supplementary']//button",
                "supp_link": "//section//a",
                "broken": "//div[@id='x']"
            }}}}"#
        )
        .unwrap();
        let store = PatternStore::load(f.path()).unwrap();
        // "broken" skipped, not fatal
        assert_eq!(store.len(), 2);
        let by_label: Vec<_> = store.rules().iter().map(|r| (&r.label[..], r.action)).collect();
        assert!(by_label.contains(&("supp_button", ActionKind::Trigger)));
        assert!(by_label.contains(&("supp_link", ActionKind::DirectLink)));
    }

    #[test]
    fn missing_patterns_key_is_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"static_patterns": {{}}}}"#).unwrap();
        let err = PatternStore::load(f.path()).unwrap_err();
        assert!(matches!(err, HarvestError::PatternFileInvalid { .. }));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "not json").unwrap();
        let err = PatternStore::load(f.path()).unwrap_err();
        assert!(matches!(err, HarvestError::PatternFileInvalid { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = PatternStore::load("/no/patterns.json").unwrap_err();
        assert!(matches!(err, HarvestError::PatternFileNotFound { .. }));
    }
}
