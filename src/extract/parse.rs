//! Model response -> raw candidates.

use serde_json::Value;

use super::{ExtractionError, ExtractionMode};
use crate::domain::RawCandidate;

/// Keys that may hold the candidate list in Multi responses
const LIST_KEYS: &[&str] = &["candidates", "bills"];

/// Drop Markdown code fences around a JSON payload
pub fn strip_code_fences(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Optional language tag on the opening fence
        s = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse a response body into candidates, normalizing the shape per mode.
///
/// Accepted shapes: one object, a `{"candidates": [...]}` / `{"bills": [...]}`
/// wrapper, or a bare array. Single mode keeps only the first element.
pub fn parse_candidates(content: &str, mode: ExtractionMode) -> Result<Vec<RawCandidate>, ExtractionError> {
    let cleaned = strip_code_fences(content);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let list = LIST_KEYS.iter().find_map(|k| match map.get(*k) {
                Some(Value::Array(items)) => Some(items.clone()),
                _ => None,
            });
            match list {
                Some(items) => items,
                None => vec![Value::Object(map)],
            }
        }
        other => {
            return Err(ExtractionError::UnrecognizedShape(shape_name(&other).to_string()));
        }
    };

    let mut candidates: Vec<RawCandidate> = items
        .iter()
        .filter(|v| v.is_object())
        .map(RawCandidate::from_json)
        .collect();

    if mode == ExtractionMode::Single {
        candidates.truncate(1);
    }
    Ok(candidates)
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
