//! Message metadata: last sender and last message text per role

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue, SenderRole};
use serde::Deserialize;

/// Registry id
pub const ID: &str = "message_metadata";

/// Role of the most recent message
pub const LAST_SENDER: &str = "last_sender";
/// Most recent user message text, truncated
pub const LAST_USER_MESSAGE: &str = "last_user_message";
/// Most recent bot message text, truncated
pub const LAST_BOT_MESSAGE: &str = "last_bot_message";
/// Most recent operator message text, truncated
pub const LAST_OPERATOR_MESSAGE: &str = "last_operator_message";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MetadataParams {
    /// Maximum characters kept from each message text
    max_text_length: usize,
}

impl Default for MetadataParams {
    fn default() -> Self {
        Self {
            max_text_length: 160,
        }
    }
}

/// Last-message metadata per sender role
pub struct MetadataProcessor {
    max_text_length: usize,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: MetadataParams = parse_params(ID, params)?;
    if params.max_text_length == 0 {
        return Err(invalid_params(ID, "max_text_length must be positive"));
    }
    Ok(Box::new(MetadataProcessor {
        max_text_length: params.max_text_length,
    }))
}

impl MetadataProcessor {
    fn truncated(&self, text: &str) -> FieldValue {
        FieldValue::Text(text.chars().take(self.max_text_length).collect())
    }

    fn last_text(&self, conversation: &Conversation, role: SenderRole) -> FieldValue {
        conversation
            .last_from(role)
            .map(|m| self.truncated(&m.text))
            .unwrap_or(FieldValue::Null)
    }
}

impl FeatureProcessor for MetadataProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            LAST_SENDER,
            LAST_USER_MESSAGE,
            LAST_BOT_MESSAGE,
            LAST_OPERATOR_MESSAGE,
        ]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let last_sender = conversation
            .last_message()
            .map(|m| FieldValue::Text(m.sender.as_str().to_string()))
            .unwrap_or(FieldValue::Null);

        Ok(vec![
            (LAST_SENDER.to_string(), last_sender),
            (
                LAST_USER_MESSAGE.to_string(),
                self.last_text(conversation, SenderRole::User),
            ),
            (
                LAST_BOT_MESSAGE.to_string(),
                self.last_text(conversation, SenderRole::Bot),
            ),
            (
                LAST_OPERATOR_MESSAGE.to_string(),
                self.last_text(conversation, SenderRole::Operator),
            ),
        ])
    }
}
