//! Per-conversation outcomes and the batch result set

use crate::digest::ConversationDigest;
use crate::record::{FeatureRecord, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How the cache participated in one conversation's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// A prior LLM output was reused; no call was made
    Hit,
    /// No prior output; the LLM was called and the result stored
    Miss,
    /// The LLM path failed (invocation or validation); nothing stored
    Error,
    /// The conversation was filtered out before the LLM path
    Skipped,
}

impl CacheStatus {
    /// Stable string form used in storage and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Error => "error",
            CacheStatus::Skipped => "skipped",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "hit" => Some(CacheStatus::Hit),
            "miss" => Some(CacheStatus::Miss),
            "error" => Some(CacheStatus::Error),
            "skipped" => Some(CacheStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one conversation inside a run
///
/// ```text
/// Pending → FeaturesExtracted → {CacheHit | LlmPending}
///         → {LlmSucceeded | LlmFailed} → Finalized
/// ```
///
/// `Finalized` and `Ignored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Queued, nothing computed yet
    Pending,
    /// Processor chain has run
    FeaturesExtracted,
    /// A cached output was found
    CacheHit,
    /// An LLM call is in flight
    LlmPending,
    /// The LLM call succeeded and validated
    LlmSucceeded,
    /// The LLM call or validation failed
    LlmFailed,
    /// Result assembled; appears in the analyzed set
    Finalized,
    /// Filtered out or unrecoverably failed; appears in the ignored set
    Ignored,
}

impl ItemState {
    /// Whether this state ends the item's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Finalized | ItemState::Ignored)
    }
}

/// Diagnostic metadata carried on every result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Ids of processors that failed for this conversation
    pub failed_processors: Vec<String>,

    /// Raw unparsed LLM response, retained on validation failure
    pub raw_response: Option<String>,

    /// Short human-readable reason for skipping or failing
    pub reason: Option<String>,

    /// Whether the transcript was truncated to fit the token budget
    pub truncated: bool,
}

/// The full outcome for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Conversation identifier
    pub identifier: String,

    /// Content digest, once computed
    pub digest: Option<ConversationDigest>,

    /// Fields produced by the processor chain
    pub features: FeatureRecord,

    /// Validated fields from the LLM (fresh or cached)
    pub llm_output: BTreeMap<String, FieldValue>,

    /// How the cache participated
    pub cache_status: CacheStatus,

    /// Terminal lifecycle state
    pub state: ItemState,

    /// Diagnostic metadata
    pub diagnostics: Diagnostics,
}

impl ProcessingResult {
    /// Look up a field by name, feature fields first, then LLM output
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.features.get(name).or_else(|| self.llm_output.get(name))
    }

    /// Project this result onto an ordered column list
    ///
    /// Missing columns become `Null`; nothing is dropped from the result
    /// itself. Output-column filtering is the caller's concern.
    pub fn row(&self, columns: &[String]) -> Vec<FieldValue> {
        columns
            .iter()
            .map(|c| self.field(c).cloned().unwrap_or(FieldValue::Null))
            .collect()
    }
}

/// The partitioned outcome of one batch run
///
/// Both partitions preserve input-batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// UUIDv7 identifying this run
    pub run_id: String,

    /// Successfully analyzed conversations
    pub analyzed: Vec<ProcessingResult>,

    /// Conversations filtered out or unrecoverably failed
    pub ignored: Vec<ProcessingResult>,
}

impl ResultSet {
    /// Create an empty result set with a fresh run id
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::now_v7().to_string(),
            analyzed: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Total number of conversations accounted for
    pub fn total(&self) -> usize {
        self.analyzed.len() + self.ignored.len()
    }

    /// Count of analyzed results with the given cache status
    pub fn count_status(&self, status: CacheStatus) -> usize {
        self.analyzed
            .iter()
            .chain(self.ignored.iter())
            .filter(|r| r.cache_status == status)
            .count()
    }

    /// Project analyzed results onto an ordered column list
    pub fn rows(&self, columns: &[String]) -> Vec<Vec<FieldValue>> {
        self.analyzed.iter().map(|r| r.row(columns)).collect()
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(identifier: &str, status: CacheStatus) -> ProcessingResult {
        let mut features = FeatureRecord::new();
        features.set("validated", FieldValue::Bool(true));
        let mut llm_output = BTreeMap::new();
        llm_output.insert("summary".to_string(), FieldValue::Text("ok".to_string()));
        ProcessingResult {
            identifier: identifier.to_string(),
            digest: None,
            features,
            llm_output,
            cache_status: status,
            state: ItemState::Finalized,
            diagnostics: Diagnostics::default(),
        }
    }

    #[test]
    fn test_field_lookup_prefers_features() {
        let mut r = result("+1", CacheStatus::Miss);
        r.features.set("summary", FieldValue::Text("feature".to_string()));
        assert_eq!(r.field("summary").unwrap().as_text(), Some("feature"));
        assert_eq!(r.field("validated").unwrap().as_bool(), Some(true));
        assert!(r.field("absent").is_none());
    }

    #[test]
    fn test_row_projection() {
        let r = result("+1", CacheStatus::Hit);
        let columns = vec![
            "summary".to_string(),
            "validated".to_string(),
            "missing".to_string(),
        ];
        let row = r.row(&columns);
        assert_eq!(row[0], FieldValue::Text("ok".to_string()));
        assert_eq!(row[1], FieldValue::Bool(true));
        assert_eq!(row[2], FieldValue::Null);
    }

    #[test]
    fn test_result_set_counts() {
        let mut set = ResultSet::new();
        set.analyzed.push(result("+1", CacheStatus::Hit));
        set.analyzed.push(result("+2", CacheStatus::Miss));
        set.ignored.push(result("+3", CacheStatus::Error));

        assert_eq!(set.total(), 3);
        assert_eq!(set.count_status(CacheStatus::Hit), 1);
        assert_eq!(set.count_status(CacheStatus::Miss), 1);
        assert_eq!(set.count_status(CacheStatus::Error), 1);
        assert_eq!(set.run_id.len(), 36);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ItemState::Finalized.is_terminal());
        assert!(ItemState::Ignored.is_terminal());
        assert!(!ItemState::LlmPending.is_terminal());
        assert!(!ItemState::Pending.is_terminal());
    }
}
