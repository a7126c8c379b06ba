//! Template detection: regex match against known template bodies

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue};
use regex::Regex;
use serde::Deserialize;

/// Registry id
pub const ID: &str = "template_match";

/// Whether the most recent message matches a known template
pub const LAST_MESSAGE_IS_TEMPLATE: &str = "last_message_is_template";
/// How many consecutive messages at the tail match templates
pub const TRAILING_TEMPLATE_COUNT: &str = "trailing_template_count";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateParams {
    /// Regex patterns for known template bodies
    patterns: Vec<String>,
}

/// Detects runs of templated messages at the conversation tail
pub struct TemplateProcessor {
    patterns: Vec<Regex>,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    _options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: TemplateParams = parse_params(ID, params)?;
    let mut patterns = Vec::with_capacity(params.patterns.len());
    for pattern in &params.patterns {
        let regex = Regex::new(pattern)
            .map_err(|e| invalid_params(ID, format!("bad pattern '{}': {}", pattern, e)))?;
        patterns.push(regex);
    }
    Ok(Box::new(TemplateProcessor { patterns }))
}

impl TemplateProcessor {
    fn is_template(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

impl FeatureProcessor for TemplateProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[LAST_MESSAGE_IS_TEMPLATE, TRAILING_TEMPLATE_COUNT]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        _reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let trailing = conversation
            .messages
            .iter()
            .rev()
            .take_while(|m| self.is_template(&m.text))
            .count();

        Ok(vec![
            (
                LAST_MESSAGE_IS_TEMPLATE.to_string(),
                FieldValue::Bool(trailing > 0),
            ),
            (
                TRAILING_TEMPLATE_COUNT.to_string(),
                FieldValue::Int(trailing as i64),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use palaver_domain::{Message, SenderRole};
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn processor() -> Box<dyn FeatureProcessor> {
        build(
            &json!({ "patterns": ["^Hi .*, your order", "We miss you"] }),
            &ChainOptions::default(),
        )
        .unwrap()
    }

    fn run(conv: &Conversation) -> FeatureRecord {
        let mut record = FeatureRecord::new();
        record.merge(
            processor()
                .extract(conv, ts(0), &FeatureRecord::new())
                .unwrap(),
        );
        record
    }

    #[test]
    fn test_trailing_run_counted() {
        let conv = Conversation::new(
            "+1",
            vec![
                Message::new(ts(100), SenderRole::User, "thanks"),
                Message::new(ts(200), SenderRole::Bot, "We miss you! Come back."),
                Message::new(ts(300), SenderRole::Bot, "Hi Ana, your order shipped"),
            ],
        );
        let record = run(&conv);
        assert_eq!(record.get_bool(LAST_MESSAGE_IS_TEMPLATE), Some(true));
        assert_eq!(
            record.get(TRAILING_TEMPLATE_COUNT),
            Some(&FieldValue::Int(2))
        );
    }

    #[test]
    fn test_run_broken_by_organic_message() {
        let conv = Conversation::new(
            "+1",
            vec![
                Message::new(ts(100), SenderRole::Bot, "We miss you!"),
                Message::new(ts(200), SenderRole::User, "stop messaging me"),
            ],
        );
        let record = run(&conv);
        assert_eq!(record.get_bool(LAST_MESSAGE_IS_TEMPLATE), Some(false));
        assert_eq!(
            record.get(TRAILING_TEMPLATE_COUNT),
            Some(&FieldValue::Int(0))
        );
    }

    #[test]
    fn test_no_patterns_matches_nothing() {
        let p = build(&json!({}), &ChainOptions::default()).unwrap();
        let conv = Conversation::new(
            "+1",
            vec![Message::new(ts(100), SenderRole::Bot, "We miss you!")],
        );
        let fields = p.extract(&conv, ts(0), &FeatureRecord::new()).unwrap();
        assert!(fields.contains(&(LAST_MESSAGE_IS_TEMPLATE.to_string(), FieldValue::Bool(false))));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = build(&json!({ "patterns": ["("] }), &ChainOptions::default());
        assert!(matches!(err, Err(ChainConfigError::InvalidParams { .. })));
    }
}
