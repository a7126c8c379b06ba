//! Handoff-pattern detection: invitation, response, and finalization

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue, SenderRole};
use serde::Deserialize;

/// Registry id
pub const ID: &str = "handoff";

/// Whether the bot invited the user to a handoff
pub const HANDOFF_INVITED: &str = "handoff_invited";
/// How the user responded: "accepted", "declined", or "none"
pub const HANDOFF_RESPONSE: &str = "handoff_response";
/// Whether the handoff reached its terminal confirmation
pub const HANDOFF_FINALIZED: &str = "handoff_finalized";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HandoffParams {
    invitation_phrases: Vec<String>,
    acceptance_phrases: Vec<String>,
    decline_phrases: Vec<String>,
    finalization_phrases: Vec<String>,
}

impl Default for HandoffParams {
    fn default() -> Self {
        Self {
            invitation_phrases: vec![
                "would you like to speak".to_string(),
                "connect you with an advisor".to_string(),
                "schedule a call".to_string(),
            ],
            acceptance_phrases: vec!["yes".to_string(), "sure".to_string(), "ok".to_string()],
            decline_phrases: vec![
                "no".to_string(),
                "not now".to_string(),
                "later".to_string(),
            ],
            finalization_phrases: vec![
                "an advisor will contact you".to_string(),
                "your call is scheduled".to_string(),
            ],
        }
    }
}

/// Keyword-driven handoff pattern detector
pub struct HandoffProcessor {
    invitations: Vec<String>,
    acceptances: Vec<String>,
    declines: Vec<String>,
    finalizations: Vec<String>,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: HandoffParams = parse_params(ID, params)?;
    if params.invitation_phrases.is_empty() {
        return Err(invalid_params(ID, "invitation_phrases must not be empty"));
    }
    let lower = |v: Vec<String>| v.into_iter().map(|s| s.to_lowercase()).collect();
    Ok(Box::new(HandoffProcessor {
        invitations: lower(params.invitation_phrases),
        acceptances: lower(params.acceptance_phrases),
        declines: lower(params.decline_phrases),
        finalizations: lower(params.finalization_phrases),
    }))
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lowered = text.to_lowercase();
    phrases.iter().any(|p| lowered.contains(p.as_str()))
}

impl FeatureProcessor for HandoffProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[HANDOFF_INVITED, HANDOFF_RESPONSE, HANDOFF_FINALIZED]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        // Index of the most recent bot invitation, if any.
        let last_invitation = conversation
            .messages
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.sender == SenderRole::Bot && contains_any(&m.text, &self.invitations))
            .map(|(idx, _)| idx);

        // Classify the first user reply after the invitation.
        let response = match last_invitation {
            None => "none",
            Some(idx) => conversation.messages[idx + 1..]
                .iter()
                .filter(|m| m.sender == SenderRole::User)
                .find_map(|m| {
                    if contains_any(&m.text, &self.acceptances) {
                        Some("accepted")
                    } else if contains_any(&m.text, &self.declines) {
                        Some("declined")
                    } else {
                        None
                    }
                })
                .unwrap_or("none"),
        };

        let finalized = conversation
            .messages
            .iter()
            .any(|m| m.sender != SenderRole::User && contains_any(&m.text, &self.finalizations));

        Ok(vec![
            (
                HANDOFF_INVITED.to_string(),
                FieldValue::Bool(last_invitation.is_some()),
            ),
            (
                HANDOFF_RESPONSE.to_string(),
                FieldValue::Text(response.to_string()),
            ),
            (HANDOFF_FINALIZED.to_string(), FieldValue::Bool(finalized)),
        ])
    }
}
