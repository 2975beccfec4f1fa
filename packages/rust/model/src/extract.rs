//! Structured-data extraction from free-form model output.
//!
//! Model responses are supposed to contain a JSON object, usually inside a
//! fenced code block, but the surrounding prose, fence tags, and stray
//! comment lines vary. This extractor is the bridge between free text and
//! typed control flow, so it is total: any input yields `Some(value)` or
//! `None`, never a panic or an error.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Fenced code block, optionally tagged `json`.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").expect("valid fenced-block regex")
});

/// First brace-delimited span, for responses without a fence.
static BARE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid bare-object regex"));

/// Line comments the model sometimes leaves inside JSON.
static LINE_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?://|#).*$").expect("valid comment regex"));

/// Extract a JSON value from model response text.
///
/// Search order: a fenced block tagged as JSON, then the first `{…}` span.
/// JavaScript- and shell-style line comments are stripped before parsing.
/// Returns `None` (with the offending prefix logged) when no parseable
/// JSON is present.
pub fn extract_structured_data(text: &str) -> Option<serde_json::Value> {
    if text.trim().is_empty() {
        warn!("received empty text for JSON extraction");
        return None;
    }

    let candidate = match FENCED_BLOCK.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str())?,
        None => match BARE_OBJECT.find(text) {
            Some(m) => m.as_str(),
            None => {
                warn!(prefix = text_prefix(text), "no JSON object found in text");
                return None;
            }
        },
    };

    let cleaned = LINE_COMMENTS.replace_all(candidate.trim(), "");

    match serde_json::from_str(cleaned.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, prefix = text_prefix(text), "invalid JSON in model response");
            debug!(candidate = %cleaned, "JSON candidate that failed to parse");
            None
        }
    }
}

/// Bounded prefix of the offending text for log lines.
fn text_prefix(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}
