//! Palaver Result Cache
//!
//! Durable, content-addressed store of LLM outputs keyed by
//! (conversation identifier, digest), implemented on SQLite.
//!
//! # Guarantees
//!
//! - Upserts are atomic: readers see either the old row or the new row,
//!   never a partial record
//! - Entries are never mutated per digest; a changed digest creates a new
//!   row, orphaning the old one for [`SqliteCache::prune`]
//! - Durable across process restarts; a single handle is safely shared
//!   across concurrent workers
//! - Prefers WAL journaling and falls back to the rollback journal when the
//!   pragma cannot be applied (e.g. network filesystems)
//!
//! Callers treat read errors as misses and write errors as best-effort;
//! neither fails a conversation's result.
//!
//! # Examples
//!
//! ```no_run
//! use palaver_cache::SqliteCache;
//!
//! let cache = SqliteCache::open("palaver-cache.db").unwrap();
//! // Cache is now ready for lookup/store/prune.
//! ```

#![warn(missing_docs)]

use palaver_domain::traits::{CachedOutput, ResultCache};
use palaver_domain::{CacheStatus, ConversationDigest, FieldValue};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored payload failed to deserialize
    #[error("invalid cached payload: {0}")]
    InvalidData(String),

    /// The connection lock was poisoned by a panicked thread
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Aggregate counts for maintenance and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Total cached entries
    pub entries: usize,

    /// Distinct conversation identifiers
    pub identifiers: usize,
}

/// SQLite-backed implementation of [`ResultCache`]
///
/// The connection lives behind a mutex so a single handle can be shared by
/// concurrent workers; SQLite's own locking plus the busy timeout keeps
/// readers from blocking indefinitely.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) a cache at the given path
    ///
    /// Use [`SqliteCache::open_in_memory`] for tests.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Open an in-memory cache (not durable; for tests)
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, CacheError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        // Prefer WAL for concurrent readers; fall back to the rollback
        // journal when the pragma cannot be applied rather than failing
        // the run.
        match conn.pragma_update(None, "journal_mode", "WAL") {
            Ok(()) => debug!("cache opened in WAL mode"),
            Err(e) => {
                warn!("WAL unavailable ({}), falling back to rollback journal", e);
                if let Err(e) = conn.pragma_update(None, "journal_mode", "DELETE") {
                    warn!("rollback journal pragma failed: {}", e);
                }
            }
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        f(&conn)
    }

    /// Aggregate counts over the whole cache
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        self.with_conn(|conn| {
            let entries: i64 =
                conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
            let identifiers: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT identifier) FROM cache_entries",
                [],
                |row| row.get(0),
            )?;
            Ok(CacheStats {
                entries: entries as usize,
                identifiers: identifiers as usize,
            })
        })
    }
}

impl ResultCache for SqliteCache {
    type Error = CacheError;

    fn lookup(
        &self,
        identifier: &str,
        digest: &ConversationDigest,
    ) -> Result<Option<CachedOutput>, CacheError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT payload, status, created_at FROM cache_entries
                     WHERE identifier = ?1 AND digest = ?2",
                    params![identifier, digest.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((payload, status, created_at)) = row else {
                return Ok(None);
            };

            let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&payload)
                .map_err(|e| CacheError::InvalidData(e.to_string()))?;
            let status = CacheStatus::from_str_name(&status)
                .ok_or_else(|| CacheError::InvalidData(format!("unknown status '{}'", status)))?;

            Ok(Some(CachedOutput {
                fields,
                status,
                created_at,
            }))
        })
    }

    fn store(
        &self,
        identifier: &str,
        digest: &ConversationDigest,
        fields: &BTreeMap<String, FieldValue>,
        status: CacheStatus,
    ) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(fields).map_err(|e| CacheError::InvalidData(e.to_string()))?;
        let created_at = chrono::Utc::now().timestamp();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cache_entries (identifier, digest, payload, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(identifier, digest) DO UPDATE SET
                 payload = excluded.payload,
                 status = excluded.status,
                 created_at = excluded.created_at",
                params![identifier, digest.as_str(), payload, status.as_str(), created_at],
            )?;
            Ok(())
        })
    }

    fn prune(&self, live: &[(String, ConversationDigest)]) -> Result<usize, CacheError> {
        // Group the keep-set per identifier; identifiers absent from `live`
        // are untouched.
        let mut keep: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (identifier, digest) in live {
            keep.entry(identifier.as_str())
                .or_default()
                .insert(digest.as_str());
        }

        self.with_conn(|conn| {
            let mut removed = 0usize;
            for (identifier, digests) in &keep {
                let placeholders = vec!["?"; digests.len()].join(", ");
                let sql = format!(
                    "DELETE FROM cache_entries
                     WHERE identifier = ? AND digest NOT IN ({})",
                    placeholders
                );
                let mut values: Vec<&dyn rusqlite::ToSql> = vec![identifier];
                for digest in digests {
                    values.push(digest);
                }
                removed += conn.execute(&sql, &values[..])?;
            }
            if removed > 0 {
                debug!("pruned {} orphaned cache entries", removed);
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn digest(tag: &str) -> ConversationDigest {
        ConversationDigest::from_hex(format!("{:0<64}", tag))
    }

    fn fields(summary: &str) -> BTreeMap<String, FieldValue> {
        let mut map = BTreeMap::new();
        map.insert(
            "summary".to_string(),
            FieldValue::Text(summary.to_string()),
        );
        map
    }

    #[test]
    fn test_lookup_miss_on_empty_cache() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let result = cache.lookup("+1", &digest("a")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_store_then_lookup() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("hello"), CacheStatus::Miss)
            .unwrap();

        let hit = cache.lookup("+1", &digest("a")).unwrap().unwrap();
        assert_eq!(hit.fields, fields("hello"));
        assert_eq!(hit.status, CacheStatus::Miss);
        assert!(hit.created_at > 0);
    }

    #[test]
    fn test_digest_mismatch_is_a_miss() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("hello"), CacheStatus::Miss)
            .unwrap();

        assert!(cache.lookup("+1", &digest("b")).unwrap().is_none());
        assert!(cache.lookup("+2", &digest("a")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("first"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+1", &digest("a"), &fields("second"), CacheStatus::Miss)
            .unwrap();

        let hit = cache.lookup("+1", &digest("a")).unwrap().unwrap();
        assert_eq!(hit.fields, fields("second"));
        assert_eq!(cache.stats().unwrap().entries, 1);
    }

    #[test]
    fn test_new_digest_creates_new_entry() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("old"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+1", &digest("b"), &fields("new"), CacheStatus::Miss)
            .unwrap();

        // The old entry is orphaned, not overwritten.
        assert_eq!(cache.stats().unwrap().entries, 2);
        assert_eq!(
            cache.lookup("+1", &digest("a")).unwrap().unwrap().fields,
            fields("old")
        );
    }

    #[test]
    fn test_prune_removes_orphans_only() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("stale"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+1", &digest("b"), &fields("live"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+2", &digest("c"), &fields("untouched"), CacheStatus::Miss)
            .unwrap();

        // "+2" is not in the keep-set, so its entries are left alone.
        let removed = cache
            .prune(&[("+1".to_string(), digest("b"))])
            .unwrap();

        assert_eq!(removed, 1);
        assert!(cache.lookup("+1", &digest("a")).unwrap().is_none());
        assert!(cache.lookup("+1", &digest("b")).unwrap().is_some());
        assert!(cache.lookup("+2", &digest("c")).unwrap().is_some());
    }

    #[test]
    fn test_durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache
                .store("+1", &digest("a"), &fields("persisted"), CacheStatus::Miss)
                .unwrap();
        }

        let reopened = SqliteCache::open(&path).unwrap();
        let hit = reopened.lookup("+1", &digest("a")).unwrap().unwrap();
        assert_eq!(hit.fields, fields("persisted"));
    }

    #[test]
    fn test_concurrent_stores_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(SqliteCache::open(dir.path().join("cache.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .store(
                            "+1",
                            &digest("a"),
                            &fields(&format!("writer-{}", i)),
                            CacheStatus::Miss,
                        )
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly one row, fully written by one of the writers.
        assert_eq!(cache.stats().unwrap().entries, 1);
        let hit = cache.lookup("+1", &digest("a")).unwrap().unwrap();
        let summary = hit.fields.get("summary").unwrap().as_text().unwrap();
        assert!(summary.starts_with("writer-"));
    }

    #[test]
    fn test_stats() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .store("+1", &digest("a"), &fields("x"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+1", &digest("b"), &fields("y"), CacheStatus::Miss)
            .unwrap();
        cache
            .store("+2", &digest("c"), &fields("z"), CacheStatus::Miss)
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.identifiers, 2);
    }
}
