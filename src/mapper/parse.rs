use serde_json::Value;
use tracing::debug;

use crate::mapper::error::MapperError;
use crate::mapper::mapping_model::{FieldMapping, MIN_MAPPING_CONFIDENCE};

/// Remove a markdown code fence (```` ```json … ``` ````) around the payload.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(open) = text.find("```") else {
        return text;
    };

    // Skip the fence line, including any language tag.
    let after_open = &text[open + 3..];
    let body = match after_open.find('\n') {
        Some(i) => &after_open[i + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Parse a model reply into confident mappings.
pub fn parse_mapping_response(raw: &str) -> Result<Vec<FieldMapping>, MapperError> {
    let payload = strip_code_fence(raw);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| MapperError::Parse(format!("response is not JSON: {}", e)))?;

    match value {
        Value::Array(entries) => Ok(filter_mappings(entries)),
        other => Err(MapperError::Parse(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

/// Keep entries with a selector, a non-blank scalar value and confidence that is
/// either absent or at least [`MIN_MAPPING_CONFIDENCE`].
pub fn filter_mappings(entries: Vec<Value>) -> Vec<FieldMapping> {
    let total = entries.len();
    let kept: Vec<FieldMapping> = entries.iter().filter_map(to_mapping).collect();

    if kept.len() < total {
        debug!(total, kept = kept.len(), "dropped low-confidence or malformed mappings");
    }
    kept
}

fn to_mapping(entry: &Value) -> Option<FieldMapping> {
    let obj = entry.as_object()?;

    let selector = obj
        .get("selector")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let value = match obj.get("value")? {
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => None,
        Some(c) => Some(c.as_f64()? as f32),
    };

    if let Some(c) = confidence {
        if c < MIN_MAPPING_CONFIDENCE {
            return None;
        }
    }

    Some(FieldMapping {
        selector: selector.to_string(),
        value,
        confidence: confidence.map(|c| c.min(1.0)),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
