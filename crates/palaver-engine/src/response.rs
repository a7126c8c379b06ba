//! Parse and validate LLM output against a recipe's expected keys

use palaver_domain::{ExpectedKey, FieldValue, KeyType};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Why an LLM response was rejected
///
/// Rejection never fails the batch; the raw response is retained on the
/// conversation's result for inspection.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The response was not parseable JSON
    #[error("JSON parse error: {0}")]
    Parse(String),

    /// The response was valid JSON but not an object
    #[error("expected a JSON object")]
    NotObject,

    /// An expected key was absent
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// A key held a value of the wrong JSON type
    #[error("key '{key}' has wrong type (expected {expected})")]
    WrongType {
        /// Offending key
        key: String,
        /// Declared type name
        expected: &'static str,
    },

    /// A closed-set key held a value outside its allowed set
    #[error("key '{key}' has disallowed value '{value}'")]
    Disallowed {
        /// Offending key
        key: String,
        /// The value the LLM produced
        value: String,
    },
}

/// Parse an LLM response and validate it against the expected keys
///
/// Every expected key must be present with exactly the declared JSON type;
/// values are never coerced. JSON `null` is accepted for open keys and
/// becomes [`FieldValue::Null`]; keys with a closed value set reject it,
/// since `null` is outside the set. Keys beyond the expected set are
/// dropped.
pub fn parse_response(
    response: &str,
    expected: &[ExpectedKey],
) -> Result<BTreeMap<String, FieldValue>, ResponseError> {
    let json_str = strip_code_fence(response);
    let json: Value =
        serde_json::from_str(json_str.trim()).map_err(|e| ResponseError::Parse(e.to_string()))?;
    let obj = json.as_object().ok_or(ResponseError::NotObject)?;

    let mut fields = BTreeMap::new();
    for key in expected {
        let value = obj
            .get(&key.name)
            .ok_or_else(|| ResponseError::MissingKey(key.name.clone()))?;
        fields.insert(key.name.clone(), validate_value(key, value)?);
    }

    for extra in obj.keys().filter(|k| !fields.contains_key(*k)) {
        debug!(key = %extra, "dropping unexpected response key");
    }

    Ok(fields)
}

fn validate_value(key: &ExpectedKey, value: &Value) -> Result<FieldValue, ResponseError> {
    if value.is_null() {
        // A closed set does not contain null.
        if key.allowed.is_some() {
            return Err(ResponseError::Disallowed {
                key: key.name.clone(),
                value: "null".to_string(),
            });
        }
        return Ok(FieldValue::Null);
    }
    match key.kind {
        KeyType::Text => {
            let text = value.as_str().ok_or_else(|| ResponseError::WrongType {
                key: key.name.clone(),
                expected: "text",
            })?;
            if let Some(allowed) = &key.allowed {
                if !allowed.iter().any(|a| a == text) {
                    return Err(ResponseError::Disallowed {
                        key: key.name.clone(),
                        value: text.to_string(),
                    });
                }
            }
            Ok(FieldValue::Text(text.to_string()))
        }
        KeyType::Integer => value
            .as_i64()
            .map(FieldValue::Int)
            .ok_or_else(|| ResponseError::WrongType {
                key: key.name.clone(),
                expected: "integer",
            }),
        KeyType::Float => value
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| ResponseError::WrongType {
                key: key.name.clone(),
                expected: "float",
            }),
        KeyType::Boolean => value
            .as_bool()
            .map(FieldValue::Bool)
            .ok_or_else(|| ResponseError::WrongType {
                key: key.name.clone(),
                expected: "boolean",
            }),
    }
}

/// Strip a markdown code fence if the response is wrapped in one
///
/// LLMs often wrap JSON in ```json blocks despite instructions not to.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => return trimmed,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
