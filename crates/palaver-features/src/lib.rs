//! Palaver Feature Extraction
//!
//! Deterministic, ordered chain of independent processors that turn one
//! conversation into a [`palaver_domain::FeatureRecord`].
//!
//! # Architecture
//!
//! ```text
//! RecipeSpec → ProcessorRegistry → ProcessorChain → FeatureRecord
//! ```
//!
//! - Processors are resolved from a static registry at build time; unknown
//!   ids, invalid parameters, and declared-field collisions fail fast with
//!   [`ChainConfigError`] before any conversation is processed.
//! - At run time a processor failure never aborts the chain: its declared
//!   fields become [`palaver_domain::FieldValue::Unavailable`] and the rest
//!   of the chain proceeds.
//! - Processors are pure functions of (conversation, parameters,
//!   record-so-far, reference time). They never read the system clock.
//!
//! # Example
//!
//! ```
//! use palaver_features::{ChainFilters, ChainOptions, ProcessorChain, ProcessorRegistry};
//! use palaver_domain::{Conversation, ProcessorSpec};
//! use chrono::Utc;
//!
//! let registry = ProcessorRegistry::with_defaults();
//! let specs = vec![ProcessorSpec::bare("temporal"), ProcessorSpec::bare("message_metadata")];
//! let chain = ProcessorChain::build(
//!     &specs,
//!     &registry,
//!     &ChainOptions::default(),
//!     &ChainFilters::default(),
//! )
//! .unwrap();
//!
//! let conversation = Conversation::new("+15550100", Vec::new());
//! let outcome = chain.run(&conversation, Utc::now());
//! assert!(outcome.failed.is_empty());
//! ```

#![warn(missing_docs)]

mod chain;
mod error;
mod processor;
pub mod processors;
mod registry;

pub use chain::{ChainFilters, ChainOutcome, ProcessorChain};
pub use error::{ChainConfigError, ProcessorError};
pub use processor::{ChainOptions, FeatureProcessor};
pub use registry::ProcessorRegistry;
