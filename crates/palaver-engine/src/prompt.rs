//! Render recipe templates into LLM requests

use crate::error::EngineError;
use palaver_domain::{FeatureRecord, FieldValue};
use palaver_llm::LlmRequest;
use regex::{Captures, Regex};

/// The placeholder the transcript is spliced into
const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

/// Splits a template around `{transcript}` and fills `{field}` placeholders
/// from a feature record
///
/// Splitting first keeps the transcript out of substitution, so message text
/// that happens to contain braces is never rewritten. Placeholders that name
/// no field in the record are left verbatim.
pub struct PromptRenderer {
    prelude: String,
    epilogue: String,
    placeholder: Regex,
}

impl PromptRenderer {
    /// Parse a template, requiring exactly one `{transcript}` placeholder
    pub fn new(template: &str) -> Result<Self, EngineError> {
        let (prelude, epilogue) = template.split_once(TRANSCRIPT_PLACEHOLDER).ok_or_else(|| {
            EngineError::Template(format!(
                "template must contain the {} placeholder",
                TRANSCRIPT_PLACEHOLDER
            ))
        })?;
        if epilogue.contains(TRANSCRIPT_PLACEHOLDER) {
            return Err(EngineError::Template(format!(
                "template contains more than one {} placeholder",
                TRANSCRIPT_PLACEHOLDER
            )));
        }
        let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| EngineError::Template(e.to_string()))?;
        Ok(Self {
            prelude: prelude.to_string(),
            epilogue: epilogue.to_string(),
            placeholder,
        })
    }

    /// Build the request for one conversation
    pub fn render(&self, record: &FeatureRecord, transcript: String) -> LlmRequest {
        LlmRequest {
            prelude: self.substitute(&self.prelude, record),
            transcript,
            epilogue: self.substitute(&self.epilogue, record),
        }
    }

    fn substitute(&self, text: &str, record: &FeatureRecord) -> String {
        self.placeholder
            .replace_all(text, |caps: &Captures<'_>| match record.get(&caps[1]) {
                Some(value) => render_value(value),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Prompt-facing rendering of a field value
fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Null => "null".to_string(),
        FieldValue::Unavailable => "unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FeatureRecord {
        let mut record = FeatureRecord::new();
        record.set("last_sender", FieldValue::Text("bot".to_string()));
        record.set("hours_since_last_message", FieldValue::Float(2.5));
        record.set("validated", FieldValue::Bool(true));
        record.set("last_operator_message", FieldValue::Unavailable);
        record
    }

    #[test]
    fn test_missing_transcript_placeholder_is_rejected() {
        let err = PromptRenderer::new("Summarize: {last_sender}");
        assert!(matches!(err, Err(EngineError::Template(_))));
    }

    #[test]
    fn test_duplicate_transcript_placeholder_is_rejected() {
        let err = PromptRenderer::new("{transcript} and again {transcript}");
        assert!(matches!(err, Err(EngineError::Template(_))));
    }

    #[test]
    fn test_field_substitution() {
        let renderer = PromptRenderer::new(
            "Last sender: {last_sender} ({hours_since_last_message}h ago)\n{transcript}\nValidated: {validated}",
        )
        .unwrap();
        let request = renderer.render(&record(), "user: hello".to_string());

        assert_eq!(request.prelude, "Last sender: bot (2.5h ago)");
        assert_eq!(request.transcript, "user: hello");
        assert_eq!(request.epilogue, "Validated: true");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let renderer = PromptRenderer::new("{no_such_field}\n{transcript}").unwrap();
        let request = renderer.render(&record(), String::new());
        assert_eq!(request.prelude, "{no_such_field}");
    }

    #[test]
    fn test_unavailable_renders_as_sentinel() {
        let renderer = PromptRenderer::new("{last_operator_message}\n{transcript}").unwrap();
        let request = renderer.render(&record(), String::new());
        assert_eq!(request.prelude, "unavailable");
    }

    #[test]
    fn test_transcript_braces_are_not_substituted() {
        let renderer = PromptRenderer::new("Prompt\n{transcript}\nEnd").unwrap();
        let request = renderer.render(&record(), "user: my code has {last_sender}".to_string());
        assert_eq!(request.transcript, "user: my code has {last_sender}");
    }
}
