//! Temporal features computed against an explicit reference time

use crate::error::{ChainConfigError, ProcessorError};
use crate::processor::{invalid_params, parse_params, ChainOptions, FeatureProcessor};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue, SenderRole};
use serde::Deserialize;

/// Registry id
pub const ID: &str = "temporal";

/// Hours between the last message and the reference time
pub const HOURS_SINCE_LAST_MESSAGE: &str = "hours_since_last_message";
/// Hours between the last user message and the reference time
pub const HOURS_SINCE_LAST_USER_MESSAGE: &str = "hours_since_last_user_message";
/// Whether the conversation is old enough for a reactivation touch
pub const REACTIVATION_ELIGIBLE: &str = "reactivation_eligible";
/// Whether the user never wrote anything
pub const NO_USER_MESSAGES: &str = "no_user_messages";

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemporalParams {
    /// Hours of silence after which a conversation is reactivation-eligible
    reactivation_window_hours: f64,
}

impl Default for TemporalParams {
    fn default() -> Self {
        Self {
            reactivation_window_hours: 24.0,
        }
    }
}

/// Elapsed-time features relative to a caller-supplied "now"
pub struct TemporalProcessor {
    window_hours: f64,
    reduced_detail: bool,
}

/// Registry constructor
pub(crate) fn build(
    params: &serde_json::Value,
    options: &ChainOptions,
) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
    let params: TemporalParams = parse_params(ID, params)?;
    if params.reactivation_window_hours <= 0.0 {
        return Err(invalid_params(
            ID,
            "reactivation_window_hours must be positive",
        ));
    }
    Ok(Box::new(TemporalProcessor {
        window_hours: params.reactivation_window_hours,
        reduced_detail: options.reduced_temporal_detail,
    }))
}

impl TemporalProcessor {
    fn elapsed_hours(&self, reference_now: DateTime<Utc>, at: DateTime<Utc>) -> FieldValue {
        let hours = ((reference_now - at).num_seconds() as f64 / 3600.0).max(0.0);
        if self.reduced_detail {
            FieldValue::Int(hours.round() as i64)
        } else {
            FieldValue::Float(hours)
        }
    }
}

impl FeatureProcessor for TemporalProcessor {
    fn id(&self) -> &'static str {
        ID
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            HOURS_SINCE_LAST_MESSAGE,
            HOURS_SINCE_LAST_USER_MESSAGE,
            REACTIVATION_ELIGIBLE,
            NO_USER_MESSAGES,
        ]
    }

    fn extract(
        &self,
        conversation: &Conversation,
        reference_now: DateTime<Utc>,
        _record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError> {
        let since_last = conversation
            .last_message()
            .map(|m| self.elapsed_hours(reference_now, m.timestamp))
            .unwrap_or(FieldValue::Null);

        let since_last_user = conversation
            .last_from(SenderRole::User)
            .map(|m| self.elapsed_hours(reference_now, m.timestamp))
            .unwrap_or(FieldValue::Null);

        let eligible = conversation
            .last_message()
            .map(|m| {
                let hours = (reference_now - m.timestamp).num_seconds() as f64 / 3600.0;
                hours >= self.window_hours
            })
            .unwrap_or(false);

        Ok(vec![
            (HOURS_SINCE_LAST_MESSAGE.to_string(), since_last),
            (HOURS_SINCE_LAST_USER_MESSAGE.to_string(), since_last_user),
            (
                REACTIVATION_ELIGIBLE.to_string(),
                FieldValue::Bool(eligible),
            ),
            (
                NO_USER_MESSAGES.to_string(),
                FieldValue::Bool(!conversation.has_user_messages()),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use palaver_domain::Message;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn processor(window: f64, reduced: bool) -> Box<dyn FeatureProcessor> {
        build(
            &json!({ "reactivation_window_hours": window }),
            &ChainOptions {
                reduced_temporal_detail: reduced,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_elapsed_hours() {
        let conv = Conversation::new(
            "+1",
            vec![
                Message::new(ts(0), SenderRole::User, "hi"),
                Message::new(ts(3600), SenderRole::Bot, "hello"),
            ],
        );
        // Reference time two hours after the first message.
        let fields = processor(24.0, false)
            .extract(&conv, ts(7200), &FeatureRecord::new())
            .unwrap();
        let record: FeatureRecord = {
            let mut r = FeatureRecord::new();
            r.merge(fields);
            r
        };

        assert_eq!(
            record.get(HOURS_SINCE_LAST_MESSAGE),
            Some(&FieldValue::Float(1.0))
        );
        assert_eq!(
            record.get(HOURS_SINCE_LAST_USER_MESSAGE),
            Some(&FieldValue::Float(2.0))
        );
        assert_eq!(record.get_bool(NO_USER_MESSAGES), Some(false));
    }

    #[test]
    fn test_reduced_detail_rounds_to_hours() {
        let conv = Conversation::new("+1", vec![Message::new(ts(0), SenderRole::User, "hi")]);
        let fields = processor(24.0, true)
            .extract(&conv, ts(5400), &FeatureRecord::new())
            .unwrap();
        // 1.5 hours rounds to 2.
        assert!(fields.contains(&(HOURS_SINCE_LAST_MESSAGE.to_string(), FieldValue::Int(2))));
    }

    #[test]
    fn test_reactivation_window() {
        let conv = Conversation::new("+1", vec![Message::new(ts(0), SenderRole::User, "hi")]);
        let p = processor(1.0, false);

        let recent = p.extract(&conv, ts(1800), &FeatureRecord::new()).unwrap();
        assert!(recent.contains(&(REACTIVATION_ELIGIBLE.to_string(), FieldValue::Bool(false))));

        let stale = p.extract(&conv, ts(7200), &FeatureRecord::new()).unwrap();
        assert!(stale.contains(&(REACTIVATION_ELIGIBLE.to_string(), FieldValue::Bool(true))));
    }

    #[test]
    fn test_empty_conversation() {
        let conv = Conversation::new("+1", Vec::new());
        let fields = processor(24.0, false)
            .extract(&conv, ts(0), &FeatureRecord::new())
            .unwrap();
        assert!(fields.contains(&(HOURS_SINCE_LAST_MESSAGE.to_string(), FieldValue::Null)));
        assert!(fields.contains(&(NO_USER_MESSAGES.to_string(), FieldValue::Bool(true))));
        assert!(fields.contains(&(REACTIVATION_ELIGIBLE.to_string(), FieldValue::Bool(false))));
    }

    #[test]
    fn test_future_message_clamps_to_zero() {
        let conv = Conversation::new("+1", vec![Message::new(ts(7200), SenderRole::User, "hi")]);
        let fields = processor(24.0, false)
            .extract(&conv, ts(0), &FeatureRecord::new())
            .unwrap();
        assert!(fields.contains(&(HOURS_SINCE_LAST_MESSAGE.to_string(), FieldValue::Float(0.0))));
    }

    #[test]
    fn test_rejects_bad_window() {
        let err = build(
            &json!({ "reactivation_window_hours": 0.0 }),
            &ChainOptions::default(),
        );
        assert!(matches!(err, Err(ChainConfigError::InvalidParams { .. })));
    }

    #[test]
    fn test_rejects_unknown_param() {
        let err = build(&json!({ "window": 3 }), &ChainOptions::default());
        assert!(matches!(err, Err(ChainConfigError::InvalidParams { .. })));
    }
}
