//! Human-transfer detection: operator activity or transfer keywords

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue};
use serde::Deserialize;

/// Registry id
pub const ID: &str = "human_transfer";

/// Whether a human took over or a transfer was signalled
pub const HUMAN_TRANSFER: &str = "human_transfer";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TransferParams {
    /// Phrases that signal a transfer to a human
    keywords: Vec<String>,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            keywords: vec![
                "transfer you to".to_string(),
                "human agent".to_string(),
                "speak with an agent".to_string(),
            ],
        }
    }
}

/// Detects human involvement: operator messages, aliases, or keywords
pub struct TransferProcessor {
    keywords: Vec<String>,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: TransferParams = parse_params(ID, params)?;
    if params.keywords.is_empty() {
        return Err(invalid_params(ID, "keywords must not be empty"));
    }
    Ok(Box::new(TransferProcessor {
        keywords: params.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
    }))
}

impl FeatureProcessor for TransferProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[HUMAN_TRANSFER]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let keyword_hit = conversation.messages.iter().any(|m| {
            let lowered = m.text.to_lowercase();
            self.keywords.iter().any(|k| lowered.contains(k.as_str()))
        });

        let transferred = conversation.has_operator_messages() || keyword_hit;

        Ok(vec![(
            HUMAN_TRANSFER.to_string(),
            FieldValue::Bool(transferred),
        )])
    }
}
