//! Extraction of the JSON object from a model response.
//!
//! Models either answer with a bare object or wrap it in a fenced Markdown
//! block, sometimes after a preamble or with several drafts. The last fenced
//! block wins.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::de::DeserializeOwned;

use crate::error::DomainError;

static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("valid regex")
});

/// Instruction appended to every prompt that expects structured output.
pub const JSON_MAGIC_PHRASE: &str =
    "Return output in JSON format and only the JSON in the Markdown code block. JSON.";

/// Locate the JSON text inside `text`.
pub fn extract_json_text(text: &str) -> Result<&str, DomainError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed);
    }

    JSON_FENCE_RE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| {
            DomainError::parse(
                "JSON markdown block not found in the message. Please use the following format:\n```json\n{...}\n```",
            )
        })
}

/// Parse the JSON object in `text` into a [`serde_json::Value`].
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, DomainError> {
    let json = extract_json_text(text)?;
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DomainError::parse(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(DomainError::parse("expected a JSON object at the top level"));
    }
    Ok(value)
}

/// Deserialize a parsed object into its typed shape; field errors are
/// reported as parse errors so they can be repaired.
pub fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| DomainError::parse(format!("invalid structure: {}", e)))
}
