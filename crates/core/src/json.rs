//! JSON helpers shared by the agents, the planner and the gatekeeper.
//!
//! Models are asked for bare JSON but regularly wrap it in a markdown fence
//! or add a sentence around it; everything that parses model output goes
//! through [`extract_payload`] first.

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[\w+-]*[ \t]*\n?(.*?)```").ok())
        .as_ref()
}

/// The JSON text inside a model reply
///
/// Returns the body of the first fenced block if there is one, otherwise the
/// span from the first `{`/`[` to the matching last `}`/`]`, otherwise the
/// trimmed input unchanged.
pub fn extract_payload(reply: &str) -> &str {
    let trimmed = reply.trim();
    if let Some(body) = fence_pattern()
        .and_then(|re| re.captures(trimmed))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
    {
        return body;
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => trimmed,
    }
}

/// Parse a model reply as JSON after stripping fences and chatter
pub fn parse_reply(reply: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(extract_payload(reply))
}

/// Text form of a scalar: strings verbatim, numbers printed, null empty
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Deserialize a field the model may emit either as `"3"` or `3`
pub fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value)
        .ok_or_else(|| de::Error::custom(format!("expected text or number, got {value}")))
}

/// Deserialize a field the model may emit as a string or as a list of strings
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(scalar_text)
            .filter(|s| !s.trim().is_empty())
            .collect()),
        other => Ok(scalar_text(&other)
            .filter(|s| !s.trim().is_empty())
            .map(|s| vec![s])
            .unwrap_or_default()),
    }
}

/// Deserialize a field the model may emit as text or as a list, joined with `,`
pub fn joined_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_list(deserializer).map(|items| items.join(","))
}
