//! Validation-phase detection: keyword match for a pre-validation marker

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue};
use serde::Deserialize;

/// Registry id
pub const ID: &str = "validation_phase";

/// Whether a pre-validation marker appears in the conversation
pub const PRE_VALIDATION_MARKER: &str = "pre_validation_marker";
/// Whether the conversation has passed the validation phase
pub const VALIDATED: &str = "validated";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ValidationParams {
    /// Phrases that mark a conversation as still pre-validation
    markers: Vec<String>,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            markers: vec![
                "verification code".to_string(),
                "confirm your identity".to_string(),
            ],
        }
    }
}

/// Detects whether a conversation is still in its validation phase
pub struct ValidationProcessor {
    markers: Vec<String>,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: ValidationParams = parse_params(ID, params)?;
    if params.markers.is_empty() {
        return Err(invalid_params(ID, "markers must not be empty"));
    }
    Ok(Box::new(ValidationProcessor {
        markers: params.markers.into_iter().map(|m| m.to_lowercase()).collect(),
    }))
}

impl FeatureProcessor for ValidationProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[PRE_VALIDATION_MARKER, VALIDATED]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let marker_present = conversation.messages.iter().any(|m| {
            let lowered = m.text.to_lowercase();
            self.markers.iter().any(|k| lowered.contains(k.as_str()))
        });

        // An empty conversation cannot have passed validation.
        let validated = !conversation.messages.is_empty() && !marker_present;

        Ok(vec![
            (
                PRE_VALIDATION_MARKER.to_string(),
                FieldValue::Bool(marker_present),
            ),
            (VALIDATED.to_string(), FieldValue::Bool(validated)),
        ])
    }
}
