//! Pull a JSON object out of free-form model text.

use std::sync::OnceLock;

use newsdesk_types::NewsdeskError;
use regex::Regex;

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence pattern is valid")
    })
}

/// Parse the model's answer as JSON. Accepts bare JSON, a fenced ```json
/// block, or prose wrapped around a single top-level object.
pub fn extract_json(text: &str) -> Result<serde_json::Value, NewsdeskError> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }

    if let Some(caps) = fence().captures(trimmed) {
        if let Ok(v) = serde_json::from_str(caps[1].trim()) {
            return Ok(v);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(v);
            }
        }
    }

    Err(NewsdeskError::MalformedOutput(format!(
        "no JSON object in model output ({} chars)",
        text.len()
    )))
}

/// A model sometimes answers with the schema it was given instead of data.
pub fn is_schema_echo(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("properties"))
}
