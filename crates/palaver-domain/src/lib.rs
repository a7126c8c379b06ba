//! Palaver Domain Layer
//!
//! This crate contains the core data model for Palaver's conversation
//! processing engine. It stays low-dependency and defines the fundamental
//! value objects and trait interfaces that all other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Conversation**: an ordered, timestamped message sequence under one
//!   identifier, immutable once handed to the engine
//! - **FeatureRecord**: field-name → scalar mapping accumulated by the
//!   processor chain
//! - **RecipeSpec**: declarative configuration selecting processors, the
//!   LLM prompt, and the expected output shape
//! - **ConversationDigest**: content hash over messages + recipe
//!   fingerprint; the cache key
//! - **ProcessingResult / ResultSet**: per-conversation outcome and the
//!   analyzed/ignored partition of a batch
//!
//! ## Architecture
//!
//! - Pure data and business rules only
//! - Infrastructure implementations (SQLite cache, HTTP providers) live in
//!   other crates
//! - Trait definitions for the cache boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod digest;
pub mod record;
pub mod recipe;
pub mod result;
pub mod traits;

// Re-exports for convenience
pub use conversation::{Conversation, Message, SenderRole};
pub use digest::ConversationDigest;
pub use record::{FeatureRecord, FieldValue};
pub use recipe::{ExpectedKey, KeyType, ProcessorSpec, RecipeSpec};
pub use result::{CacheStatus, Diagnostics, ItemState, ProcessingResult, ResultSet};
