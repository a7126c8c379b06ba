//! Static processor registry
//!
//! Replaces dynamic loading by string path: every processor id maps to a
//! constructor known at compile time, validated when the chain is built.

use crate::error::ChainConfigError;
use crate::processor::{ChainOptions, FeatureProcessor};
use crate::processors::{handoff, metadata, state, template, temporal, transfer, validation};
use palaver_domain::ProcessorSpec;
use std::collections::HashMap;

/// Constructor signature for registered processors
pub type BuildFn =
    fn(&serde_json::Value, &ChainOptions) -> Result<Box<dyn FeatureProcessor>, ChainConfigError>;

/// Maps stable processor ids to constructors
pub struct ProcessorRegistry {
    builders: HashMap<&'static str, BuildFn>,
}

impl ProcessorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A registry with all built-in processors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(temporal::ID, temporal::build);
        registry.register(metadata::ID, metadata::build);
        registry.register(handoff::ID, handoff::build);
        registry.register(template::ID, template::build);
        registry.register(validation::ID, validation::build);
        registry.register(state::ID, state::build);
        registry.register(transfer::ID, transfer::build);
        registry
    }

    /// Register (or replace) a constructor under an id
    pub fn register(&mut self, id: &'static str, builder: BuildFn) {
        self.builders.insert(id, builder);
    }

    /// Whether an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.builders.contains_key(id)
    }

    /// Build the processor a spec names, with its parameters
    pub fn build(
        &self,
        spec: &ProcessorSpec,
        options: &ChainOptions,
    ) -> Result<Box<dyn FeatureProcessor>, ChainConfigError> {
        let builder = self
            .builders
            .get(spec.id.as_str())
            .ok_or_else(|| ChainConfigError::UnknownProcessor(spec.id.clone()))?;
        builder(&spec.params, options)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_builtins() {
        let registry = ProcessorRegistry::with_defaults();
        for id in [
            "temporal",
            "message_metadata",
            "handoff",
            "template_match",
            "validation_phase",
            "conversation_state",
            "human_transfer",
        ] {
            assert!(registry.contains(id), "missing builtin '{}'", id);
        }
    }

    #[test]
    fn test_unknown_id_fails_fast() {
        let registry = ProcessorRegistry::with_defaults();
        let err = registry.build(&ProcessorSpec::bare("nonexistent"), &ChainOptions::default());
        assert!(matches!(err, Err(ChainConfigError::UnknownProcessor(id)) if id == "nonexistent"));
    }

    #[test]
    fn test_build_with_params() {
        let registry = ProcessorRegistry::with_defaults();
        let spec = ProcessorSpec {
            id: "temporal".to_string(),
            params: serde_json::json!({ "reactivation_window_hours": 48.0 }),
        };
        let processor = registry.build(&spec, &ChainOptions::default()).unwrap();
        assert_eq!(processor.id(), "temporal");
    }
}
