//! Extract structured JSON from LLM responses
//!
//! Every generation contract in this crate asks for a single JSON object, but
//! models wrap payloads in prose, code fences, or a one-element array. The
//! extraction here tolerates all of that without ever trusting a fixed
//! character offset: locate the first opener, take through the matching kind
//! of closer, then unwrap an array-of-one if needed.

use crate::core::error::{Result, WorldlineError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extract the JSON payload from a response (handles surrounding text and
/// code fences). Returns the slice from the first `{` or `[` through the last
/// closer of the same kind.
pub fn extract_json(response: &str) -> Result<&str> {
    let obj_start = response.find('{');
    let arr_start = response.find('[');
    let (start, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => {
            return Err(WorldlineError::LlmError(
                "No JSON found in response".into(),
            ))
        }
    };
    let end = response
        .rfind(close)
        .filter(|end| *end >= start)
        .ok_or_else(|| {
            WorldlineError::LlmError(format!("No closing '{}' found in response", close))
        })?;
    Ok(&response[start..=end])
}

/// Parse a payload that must be one object, tolerating the array-of-one form
/// some models produce.
pub fn parse_single<T: DeserializeOwned>(payload: &str) -> Result<T> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| WorldlineError::LlmError(format!("Invalid JSON payload: {}", e)))?;
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Array(items) => {
            return Err(WorldlineError::LlmError(format!(
                "Expected one object, got an array of {}",
                items.len()
            )))
        }
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| WorldlineError::LlmError(format!("Payload does not match contract: {}", e)))
}

/// Like `parse_single`, but keeps the raw object form for callers that need
/// to normalize keys before typing the record.
pub fn parse_single_object(payload: &str) -> Result<serde_json::Map<String, Value>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| WorldlineError::LlmError(format!("Invalid JSON payload: {}", e)))?;
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Array(items) => {
            return Err(WorldlineError::LlmError(format!(
                "Expected one object, got an array of {}",
                items.len()
            )))
        }
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(WorldlineError::LlmError(format!(
            "Expected a JSON object, got {}",
            match other {
                Value::Null => "null",
                Value::Bool(_) => "a bool",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => "an object",
            }
        ))),
    }
}
