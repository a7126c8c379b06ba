//! Trait definitions for external interactions
//!
//! These traits define the boundary between the engine and infrastructure.
//! Implementations live in other crates (`palaver-cache` for storage).

use crate::digest::ConversationDigest;
use crate::record::FieldValue;
use crate::result::CacheStatus;
use std::collections::BTreeMap;

/// A previously computed LLM output, as retrieved from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutput {
    /// Validated LLM output fields
    pub fields: BTreeMap<String, FieldValue>,

    /// Status recorded when the entry was stored
    pub status: CacheStatus,

    /// Unix seconds when the entry was stored
    pub created_at: i64,
}

/// Content-addressed store of LLM outputs, keyed by (identifier, digest)
///
/// Implementations must provide an atomic upsert: concurrent stores for the
/// same key never expose a partially written record to readers. Entries are
/// never mutated per digest: a changed digest creates a new entry and
/// orphans the old one, which `prune` may remove.
///
/// Implementations take `&self` and handle their own interior locking so a
/// single handle can be shared across concurrent workers.
pub trait ResultCache: Send + Sync {
    /// Error type for cache operations
    type Error: std::fmt::Display;

    /// Return the prior output for this exact (identifier, digest) key
    ///
    /// Any digest mismatch is a miss. Callers treat errors as misses.
    fn lookup(
        &self,
        identifier: &str,
        digest: &ConversationDigest,
    ) -> Result<Option<CachedOutput>, Self::Error>;

    /// Idempotent upsert of an output under (identifier, digest)
    ///
    /// Callers treat errors as best-effort: a failed write is logged and
    /// never fails the conversation's result.
    fn store(
        &self,
        identifier: &str,
        digest: &ConversationDigest,
        fields: &BTreeMap<String, FieldValue>,
        status: CacheStatus,
    ) -> Result<(), Self::Error>;

    /// Delete entries for known identifiers whose digest is not in `live`
    ///
    /// Returns the number of entries removed. Identifiers absent from
    /// `live` are left alone.
    fn prune(&self, live: &[(String, ConversationDigest)]) -> Result<usize, Self::Error>;
}
