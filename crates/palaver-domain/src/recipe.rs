//! Recipe specification - declarative configuration for one analysis run

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One processor to run, with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    /// Registry id of the processor
    pub id: String,

    /// Processor-specific parameters
    #[serde(default = "default_params")]
    pub params: serde_json::Value,
}

fn default_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ProcessorSpec {
    /// Create a spec with empty parameters
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: default_params(),
        }
    }
}

/// Declared type of an expected LLM output key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Free-form text
    Text,
    /// Signed integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
}

impl KeyType {
    /// Stable string form, folded into the recipe fingerprint
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Text => "text",
            KeyType::Integer => "integer",
            KeyType::Float => "float",
            KeyType::Boolean => "boolean",
        }
    }
}

/// One key the LLM response must contain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedKey {
    /// Key name in the JSON response
    pub name: String,

    /// Declared type
    pub kind: KeyType,

    /// Optional closed set of allowed values (text keys only). When set,
    /// the response must hold one of these values; `null` is rejected too.
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
}

impl ExpectedKey {
    /// A text key with no enum constraint
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: KeyType::Text,
            allowed: None,
        }
    }

    /// A text key restricted to the given values
    pub fn enumeration(name: impl Into<String>, allowed: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: KeyType::Text,
            allowed: Some(allowed),
        }
    }
}

/// Declarative configuration for a run
///
/// Parsed and schema-validated by an external collaborator; the engine
/// receives it ready to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSpec {
    /// Recipe name, for diagnostics
    pub name: String,

    /// Semantic version; bumping it invalidates all cached results
    pub version: String,

    /// Processors to run, in declared order
    pub processors: Vec<ProcessorSpec>,

    /// LLM prompt template with `{field}` placeholders
    pub prompt_template: String,

    /// Keys the LLM response must contain
    pub expected_keys: Vec<ExpectedKey>,

    /// Final output shape and order (consumed by collaborators)
    pub output_columns: Vec<String>,

    /// Skip conversations with no user messages instead of prompting
    #[serde(default)]
    pub skip_no_user_messages: bool,

    /// Round temporal features to whole hours
    #[serde(default)]
    pub reduced_temporal_detail: bool,
}

impl RecipeSpec {
    /// Stable fingerprint of everything that affects the LLM output
    ///
    /// Folds the version, prompt template, and expected-key schema, so any
    /// change to them changes every conversation digest and forces cache
    /// misses. Processor parameters are deliberately excluded: they shape
    /// the prompt through rendered fields, which the prompt template and
    /// transcript already cover.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.prompt_template.as_bytes());
        hasher.update([0u8]);
        for key in &self.expected_keys {
            hasher.update(key.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(key.kind.as_str().as_bytes());
            hasher.update([0x1f]);
            if let Some(allowed) = &key.allowed {
                for value in allowed {
                    hasher.update(value.as_bytes());
                    hasher.update([0x1e]);
                }
            }
            hasher.update([0u8]);
        }
        hex_encode(&hasher.finalize())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
