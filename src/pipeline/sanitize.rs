//! Vendor-boilerplate removal from consolidated text.
//!
//! Full-text bodies arrive wrapped in a vendor banner that appears twice:
//! once before and once after the boilerplate block. The sanitizer removes
//! the span from the first case-insensitive marker occurrence through the end
//! of the second occurrence — a single pass, never all pairs — then collapses
//! every whitespace run to a single space and trims. Zero or one marker
//! occurrence leaves the text unchanged apart from the whitespace collapse,
//! which also makes the pass idempotent on such inputs.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip one marker-delimited boilerplate span and normalize whitespace.
pub fn sanitize(text: &str, marker: &str) -> String {
    let stripped = strip_first_span(text, marker);
    RE_WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Remove the first `marker … marker` span, inclusive, case-insensitive.
/// With fewer than two occurrences the text passes through unchanged.
fn strip_first_span(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.to_string();
    }
    let escaped = regex::escape(marker);
    let pattern = format!("(?is){escaped}.*?{escaped}");
    match Regex::new(&pattern) {
        Ok(re) => re.replacen(text, 1, "").into_owned(),
        // An unbuildable pattern can only come from a pathological marker;
        // pass the text through rather than lose it.
        Err(_) => text.to_string(),
    }
}
