//! Conversation-state aggregation over upstream handoff/validation fields

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{ChainOptions, FeatureProcessor};
use crate::processors::{handoff, validation};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue};
use std::fmt;

/// Registry id
pub const ID: &str = "conversation_state";

/// Aggregated conversation state
pub const CONVERSATION_STATE: &str = "conversation_state";

/// Where a conversation sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Identity not yet validated
    PreValidation,
    /// Validated, no handoff completed
    PostValidation,
    /// Handoff reached its terminal confirmation
    Handoff,
    /// Upstream fields unavailable; state cannot be derived
    Unknown,
}

impl ConversationState {
    /// Stable string form stored in the record
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::PreValidation => "pre_validation",
            ConversationState::PostValidation => "post_validation",
            ConversationState::Handoff => "handoff",
            ConversationState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small state machine over the handoff and validation outputs
///
/// Must be configured after `handoff` and `validation_phase` in the chain;
/// when either upstream field is missing or unavailable the state is
/// `unknown` rather than a guess.
pub struct StateProcessor;

/// Registry constructor
pub(crate) fn build(
    _params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    Ok(Box::new(StateProcessor))
}

impl FeatureProcessor for StateProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[CONVERSATION_STATE]
    }

    fn extract(
        &self,
        _conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let finalized = record.get_bool(handoff::HANDOFF_FINALIZED);
        let validated = record.get_bool(validation::VALIDATED);

        let state = match (finalized, validated) {
            (Some(true), _) => ConversationState::Handoff,
            (_, Some(true)) => ConversationState::PostValidation,
            (Some(false), Some(false)) => ConversationState::PreValidation,
            _ => ConversationState::Unknown,
        };

        Ok(vec![(
            CONVERSATION_STATE.to_string(),
            FieldValue::Text(state.as_str().to_string()),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn state_for(fields: &[(&str, FieldValue)]) -> String {
        let p = build(&json!({}), &ChainOptions::default()).unwrap();
        let mut record = FeatureRecord::new();
        for (name, value) in fields {
            record.set(*name, value.clone());
        }
        let conv = Conversation::new("+1", Vec::new());
        let out = p.extract(&conv, ts(0), &record).unwrap();
        out[0].1.as_text().unwrap().to_string()
    }

    #[test]
    fn test_finalized_wins() {
        let state = state_for(&[
            (handoff::HANDOFF_FINALIZED, FieldValue::Bool(true)),
            (validation::VALIDATED, FieldValue::Bool(false)),
        ]);
        assert_eq!(state, "handoff");
    }

    #[test]
    fn test_validated_without_handoff() {
        let state = state_for(&[
            (handoff::HANDOFF_FINALIZED, FieldValue::Bool(false)),
            (validation::VALIDATED, FieldValue::Bool(true)),
        ]);
        assert_eq!(state, "post_validation");
    }

    #[test]
    fn test_neither() {
        let state = state_for(&[
            (handoff::HANDOFF_FINALIZED, FieldValue::Bool(false)),
            (validation::VALIDATED, FieldValue::Bool(false)),
        ]);
        assert_eq!(state, "pre_validation");
    }

    #[test]
    fn test_unavailable_upstream_is_unknown() {
        let state = state_for(&[
            (handoff::HANDOFF_FINALIZED, FieldValue::Unavailable),
            (validation::VALIDATED, FieldValue::Bool(false)),
        ]);
        assert_eq!(state, "unknown");
    }

    #[test]
    fn test_missing_upstream_is_unknown() {
        assert_eq!(state_for(&[]), "unknown");
    }
}
