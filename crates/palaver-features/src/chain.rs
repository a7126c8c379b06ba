//! Ordered processor chain with per-processor failure isolation

use crate::error::ChainConfigError;
use crate::processor::{ChainOptions, FeatureProcessor};
use crate::registry::ProcessorRegistry;
use chrono::{DateTime, Utc};
use palaver_domain::{Conversation, FeatureRecord, FieldValue, ProcessorSpec};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Optional selection filters, applied without reordering the base chain
#[derive(Debug, Clone, Default)]
pub struct ChainFilters {
    /// Processor ids to leave out
    pub skip: HashSet<String>,

    /// When set, only these processor ids run
    pub only: Option<HashSet<String>>,
}

impl ChainFilters {
    fn includes(&self, id: &str) -> bool {
        if self.skip.contains(id) {
            return false;
        }
        match &self.only {
            Some(only) => only.contains(id),
            None => true,
        }
    }
}

/// What one chain run produced
#[derive(Debug)]
pub struct ChainOutcome {
    /// The accumulated feature record
    pub record: FeatureRecord,

    /// Ids of processors that failed for this conversation
    pub failed: Vec<String>,
}

/// A validated, ordered sequence of processors
///
/// Built once per run; safe to share across workers.
pub struct ProcessorChain {
    processors: Vec<Box<dyn FeatureProcessor>>,
}

impl ProcessorChain {
    /// Build a chain from recipe specs, failing fast on configuration errors
    ///
    /// Every spec id is resolved (even filtered-out ones, so a typo in a
    /// skipped id still surfaces), then filters select which processors run,
    /// and declared output fields are checked for collisions across the
    /// selected set.
    pub fn build(
        specs: &[ProcessorSpec],
        registry: &ProcessorRegistry,
        options: &ChainOptions,
        filters: &ChainFilters,
    ) -> Result<Self, ChainConfigError> {
        let mut processors = Vec::new();
        for spec in specs {
            let processor = registry.build(spec, options)?;
            if filters.includes(&spec.id) {
                processors.push(processor);
            }
        }

        // Declared field ownership must not overlap.
        let mut owners: HashMap<&'static str, &'static str> = HashMap::new();
        for processor in &processors {
            for field in processor.fields() {
                if let Some(first) = owners.insert(field, processor.id()) {
                    return Err(ChainConfigError::FieldCollision {
                        field: field.to_string(),
                        first: first.to_string(),
                        second: processor.id().to_string(),
                    });
                }
            }
        }

        Ok(Self { processors })
    }

    /// Ids of the processors that will run, in order
    pub fn processor_ids(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.id()).collect()
    }

    /// Run every processor against one conversation
    ///
    /// A processor failure never aborts the chain: its declared fields are
    /// set to `Unavailable`, the id is recorded, and later processors still
    /// run (seeing the sentinel values in the record-so-far).
    pub fn run(&self, conversation: &Conversation, reference_now: DateTime<Utc>) -> ChainOutcome {
        let mut record = FeatureRecord::new();
        let mut failed = Vec::new();

        for processor in &self.processors {
            match processor.extract(conversation, reference_now, &record) {
                Ok(fields) => record.merge(fields),
                Err(e) => {
                    warn!(
                        processor = processor.id(),
                        identifier = %conversation.identifier,
                        "processor failed: {}",
                        e
                    );
                    for field in processor.fields() {
                        record.set(*field, FieldValue::Unavailable);
                    }
                    failed.push(processor.id().to_string());
                }
            }
        }

        ChainOutcome { record, failed }
    }
}
