//! The processor trait and build-time options

use crate::error::{ChainConfigError, ProcessorError};
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue};
use serde::de::DeserializeOwned;

/// Build-time options threaded from the recipe into processor constructors
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainOptions {
    /// Round temporal features to whole hours
    pub reduced_temporal_detail: bool,
}

/// A stateless feature extractor
///
/// Processors declare their output fields up front so the chain can reject
/// overlapping declarations at build time. `extract` is a pure function of
/// its arguments; the reference time is caller-supplied for determinism and
/// implementations must never read the system clock.
pub trait FeatureProcessor: Send + Sync {
    /// Stable registry id
    fn id(&self) -> &'static str;

    /// Field names this processor owns
    fn fields(&self) -> &'static [&'static str];

    /// Compute this processor's fields for one conversation
    ///
    /// `record` holds the output of earlier processors in the chain, for
    /// processors that aggregate upstream fields.
    fn extract(
        &self,
        conversation: &Conversation,
        reference_now: DateTime<Utc>,
        record: &FeatureRecord,
    ) -> Result<Vec<(String, FieldValue)>, ProcessorError>;
}

/// Deserialize processor parameters, treating problems as configuration errors
pub(crate) fn parse_params<T>(id: &str, params: &serde_json::Value) -> Result<T, ChainConfigError>
where
    T: DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| ChainConfigError::InvalidParams {
        id: id.to_string(),
        message: e.to_string(),
    })
}

/// Shorthand for an invalid-parameter configuration error
pub(crate) fn invalid_params(id: &str, message: impl Into<String>) -> ChainConfigError {
    ChainConfigError::InvalidParams {
        id: id.to_string(),
        message: message.into(),
    }
}
