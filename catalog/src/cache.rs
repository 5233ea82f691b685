//! Persistent memoization of catalog queries
//!
//! Catalog calls take seconds and are rate limited, while tree exploration
//! and dataset resolution issue one call per node or name variant. Every
//! idempotent query therefore goes through [`MemoizedResolver`], backed by
//! a SQLite file that survives restarts:
//! - a hit returns the stored value without touching the catalog
//! - a failed computation is never stored
//! - callers in one process asking for the same key are serialized on that
//!   key, so the catalog sees at most one call per key
//!
//! Separate processes sharing the file may both compute a missing key; the
//! last write wins and both values are equally valid.

use crate::address::AddressKey;
use crate::config::CatalogConfig;
use crate::errors::{CatalogError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Embedded schema SQL from CACHE_SCHEMA.sql
const SCHEMA_SQL: &str = include_str!("../CACHE_SCHEMA.sql");

/// Identity of one memoized catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Child hashtags of an address
    HashtagChildren(AddressKey),
    /// Every address reachable in a scope
    ScopeAddresses(String),
    /// Dataset rows attached to an address
    AddressDatasets(AddressKey),
    /// Containers matching a name pattern
    ContainerSearch { scope: String, pattern: String },
    /// Members of a container
    ContainerContent { scope: String, name: String },
    /// Ancestry of a dataset
    Provenance { scope: String, dataset: String },
    /// Metadata record of a dataset
    Metadata { scope: String, dataset: String },
    /// Hashtags attached to a dataset
    DatasetHashtags { dataset: String },
}

impl CacheKey {
    /// Every namespace a key can live in
    pub const NAMESPACES: [&'static str; 8] = [
        "hashtag_children",
        "scope_addresses",
        "address_datasets",
        "container_search",
        "container_content",
        "provenance",
        "metadata",
        "dataset_hashtags",
    ];

    /// Stable namespace stored alongside the key
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::HashtagChildren(_) => "hashtag_children",
            Self::ScopeAddresses(_) => "scope_addresses",
            Self::AddressDatasets(_) => "address_datasets",
            Self::ContainerSearch { .. } => "container_search",
            Self::ContainerContent { .. } => "container_content",
            Self::Provenance { .. } => "provenance",
            Self::Metadata { .. } => "metadata",
            Self::DatasetHashtags { .. } => "dataset_hashtags",
        }
    }

    /// Stable textual key within the namespace
    pub fn encode(&self) -> String {
        match self {
            Self::HashtagChildren(address) | Self::AddressDatasets(address) => address.to_string(),
            Self::ScopeAddresses(scope) => scope.clone(),
            Self::ContainerSearch { scope, pattern } => format!("{scope}:{pattern}"),
            Self::ContainerContent { scope, name } => format!("{scope}:{name}"),
            Self::Provenance { scope, dataset } | Self::Metadata { scope, dataset } => {
                format!("{scope}:{dataset}")
            }
            Self::DatasetHashtags { dataset } => dataset.clone(),
        }
    }

    /// Primary key of the row: sha256 over namespace and key
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.encode().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A row from cache_entries table
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub namespace: String,
    pub cache_key: String,
    pub value_json: String,
    pub created_at: DateTime<Utc>,
    pub hit_count: i64,
    pub last_hit_at: Option<DateTime<Utc>>,
}

/// Entry and hit counts for one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: i64,
    pub hits: i64,
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// SQLite-backed key/value store
pub struct CacheStore {
    conn: Connection,
}

impl CacheStore {
    /// Open (creating if needed) the store at the configured location
    pub fn open(cfg: &CatalogConfig) -> Result<Self> {
        Self::open_at_path(&cfg.resolved_cache_db_path())
    }

    /// Open a store at a specific database path
    pub fn open_at_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::cache_with_source(
                    format!("failed to create cache directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            CatalogError::cache_with_source(
                format!("failed to open cache at {}", path.display()),
                e,
            )
        })?;

        Self::apply_schema(&conn)?;

        tracing::debug!(path = %path.display(), "catalog cache opened");

        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CatalogError::cache_with_source("failed to open in-memory cache", e))?;

        Self::apply_schema(&conn)?;

        Ok(Self { conn })
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| CatalogError::cache_with_source("failed to apply schema", e))?;
        Ok(())
    }

    /// Look up an entry
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.conn
            .query_row(
                r#"
                SELECT namespace, cache_key, value_json, created_at, hit_count, last_hit_at
                FROM cache_entries
                WHERE key_hash = ?1
                "#,
                params![key.hash()],
                |row| {
                    Ok(CacheEntry {
                        namespace: row.get(0)?,
                        cache_key: row.get(1)?,
                        value_json: row.get(2)?,
                        created_at: row
                            .get::<_, String>(3)
                            .ok()
                            .and_then(|s| parse_timestamp(&s))
                            .unwrap_or_else(Utc::now),
                        hit_count: row.get(4)?,
                        last_hit_at: row
                            .get::<_, Option<String>>(5)?
                            .and_then(|s| parse_timestamp(&s)),
                    })
                },
            )
            .optional()
            .map_err(|e| CatalogError::cache_with_source("failed to read cache entry", e))
    }

    /// Insert or replace an entry in one statement
    pub fn put(&self, key: &CacheKey, value_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                r#"
                INSERT OR REPLACE INTO cache_entries
                (key_hash, namespace, cache_key, value_json, created_at, hit_count, last_hit_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)
                "#,
                params![key.hash(), key.namespace(), key.encode(), value_json, now],
            )
            .map_err(|e| CatalogError::cache_with_source("failed to write cache entry", e))?;
        Ok(())
    }

    /// Record a cache hit (increment hit_count, update last_hit_at)
    pub fn record_hit(&self, key: &CacheKey) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                r#"
                UPDATE cache_entries
                SET hit_count = hit_count + 1,
                    last_hit_at = ?2
                WHERE key_hash = ?1
                "#,
                params![key.hash(), now],
            )
            .map_err(|e| CatalogError::cache_with_source("failed to record cache hit", e))?;
        Ok(())
    }

    /// Remove one entry; returns whether it existed
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM cache_entries WHERE key_hash = ?1",
                params![key.hash()],
            )
            .map_err(|e| CatalogError::cache_with_source("failed to remove cache entry", e))?;
        Ok(deleted > 0)
    }

    /// Delete every entry, or only those of one namespace
    pub fn clear(&self, namespace: Option<&str>) -> Result<usize> {
        let deleted = match namespace {
            Some(ns) => self
                .conn
                .execute("DELETE FROM cache_entries WHERE namespace = ?1", params![ns]),
            None => self.conn.execute("DELETE FROM cache_entries", []),
        }
        .map_err(|e| CatalogError::cache_with_source("failed to clear cache", e))?;
        Ok(deleted)
    }

    /// Get entry count (for metrics/debugging)
    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .map_err(|e| CatalogError::cache_with_source("failed to count cache entries", e))
    }

    /// Entry and hit counts per namespace, sorted by namespace
    pub fn stats(&self) -> Result<Vec<NamespaceStats>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT namespace, COUNT(*), COALESCE(SUM(hit_count), 0)
                FROM cache_entries
                GROUP BY namespace
                ORDER BY namespace
                "#,
            )
            .map_err(|e| CatalogError::cache_with_source("failed to prepare query", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(NamespaceStats {
                    namespace: row.get(0)?,
                    entries: row.get(1)?,
                    hits: row.get(2)?,
                })
            })
            .map_err(|e| CatalogError::cache_with_source("failed to query cache stats", e))?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(
                row.map_err(|e| CatalogError::cache_with_source("failed to read stats row", e))?,
            );
        }
        Ok(stats)
    }
}

/// Memoizes expensive, idempotent computations in a [`CacheStore`].
///
/// Injected into every resolver; tests hand in an in-memory instance.
pub struct MemoizedResolver {
    store: Mutex<CacheStore>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoizedResolver {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store: Mutex::new(store),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver over the configured on-disk store
    pub fn open(cfg: &CatalogConfig) -> Result<Self> {
        Ok(Self::new(CacheStore::open(cfg)?))
    }

    /// Resolver over a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(CacheStore::open_in_memory()?))
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result. Errors from `compute` propagate and leave no entry behind.
    pub fn resolve<T, F>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key_lock = self.key_lock(key);
        let value = {
            let _guard = key_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.resolve_locked(key, compute)
        };
        self.release_key_lock(key, key_lock);
        value
    }

    fn resolve_locked<T, F>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let cached = self.store()?.get(key)?;
        if let Some(entry) = cached {
            match serde_json::from_str::<T>(&entry.value_json) {
                Ok(value) => {
                    if let Err(e) = self.store()?.record_hit(key) {
                        tracing::warn!(
                            namespace = key.namespace(),
                            key = %key.encode(),
                            error = %e,
                            "failed to record cache hit"
                        );
                    }
                    tracing::debug!(
                        namespace = key.namespace(),
                        key = %key.encode(),
                        "cache hit"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        namespace = key.namespace(),
                        key = %key.encode(),
                        error = %e,
                        "cached value no longer decodes, recomputing"
                    );
                }
            }
        }

        tracing::debug!(namespace = key.namespace(), key = %key.encode(), "cache miss");
        let value = compute()?;
        let json = serde_json::to_string(&value)
            .map_err(|e| CatalogError::cache_with_source("failed to encode cache value", e))?;
        self.store()?.put(key, &json)?;
        Ok(value)
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.hash()).or_default())
    }

    /// Drop the per-key lock once nobody else is waiting on it.
    fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map holds one reference and we hold the other.
        if Arc::strong_count(&key_lock) == 2 {
            locks.remove(&key.hash());
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, CacheStore>> {
        self.store
            .lock()
            .map_err(|_| CatalogError::internal("cache store lock poisoned"))
    }

    /// Whether a value is stored for `key`
    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.store()?.get(key)?.is_some())
    }

    /// Delete every entry, or only one namespace
    pub fn clear(&self, namespace: Option<&str>) -> Result<usize> {
        let deleted = self.store()?.clear(namespace)?;
        tracing::info!(namespace = namespace.unwrap_or("*"), deleted, "cache cleared");
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<Vec<NamespaceStats>> {
        self.store()?.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn root_key(scope: &str) -> CacheKey {
        CacheKey::HashtagChildren(AddressKey::root(scope).expect("address"))
    }

    #[test]
    fn test_schema_applies() {
        let store = CacheStore::open_in_memory().expect("should open");
        assert_eq!(store.count().expect("count"), 0);
        assert!(store.stats().expect("stats").is_empty());
    }

    #[test]
    fn test_store_crud() {
        let store = CacheStore::open_in_memory().expect("should open");
        let key = root_key("mc20_13TeV");

        store.put(&key, r#"["a","b"]"#).expect("put");
        let entry = store.get(&key).expect("get").expect("exists");
        assert_eq!(entry.namespace, "hashtag_children");
        assert_eq!(entry.cache_key, "mc20_13TeV");
        assert_eq!(entry.value_json, r#"["a","b"]"#);
        assert_eq!(entry.hit_count, 0);

        store.record_hit(&key).expect("hit");
        let entry = store.get(&key).expect("get").expect("exists");
        assert_eq!(entry.hit_count, 1);
        assert!(entry.last_hit_at.is_some());

        // Replace resets the row
        store.put(&key, r#"["c"]"#).expect("put");
        let entry = store.get(&key).expect("get").expect("exists");
        assert_eq!(entry.value_json, r#"["c"]"#);
        assert_eq!(store.count().expect("count"), 1);

        assert!(store.remove(&key).expect("remove"));
        assert!(!store.remove(&key).expect("remove again"));
        assert!(store.get(&key).expect("get").is_none());
    }

    #[test]
    fn test_clear_by_namespace() {
        let store = CacheStore::open_in_memory().expect("should open");
        store.put(&root_key("mc20_13TeV"), "[]").expect("put");
        store.put(&root_key("mc23_13p6TeV"), "[]").expect("put");
        store
            .put(
                &CacheKey::Metadata {
                    scope: "mc20_13TeV".to_string(),
                    dataset: "ds".to_string(),
                },
                "{}",
            )
            .expect("put");

        let stats = store.stats().expect("stats");
        assert_eq!(
            stats,
            vec![
                NamespaceStats {
                    namespace: "hashtag_children".to_string(),
                    entries: 2,
                    hits: 0,
                },
                NamespaceStats {
                    namespace: "metadata".to_string(),
                    entries: 1,
                    hits: 0,
                },
            ]
        );

        assert_eq!(store.clear(Some("hashtag_children")).expect("clear"), 2);
        assert_eq!(store.count().expect("count"), 1);
        assert_eq!(store.clear(None).expect("clear"), 1);
    }

    #[test]
    fn test_keys_do_not_collide_across_namespaces() {
        let address = AddressKey::root("mc20_13TeV").expect("address");
        let a = CacheKey::HashtagChildren(address.clone());
        let b = CacheKey::AddressDatasets(address);
        assert_eq!(a.encode(), b.encode());
        assert_ne!(a.hash(), b.hash());
        assert!(CacheKey::NAMESPACES.contains(&a.namespace()));
        assert!(CacheKey::NAMESPACES.contains(&b.namespace()));
    }

    #[test]
    fn test_resolve_computes_once() {
        let resolver = MemoizedResolver::in_memory().expect("resolver");
        let key = root_key("mc20_13TeV");
        let calls = AtomicUsize::new(0);

        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        };
        let first: Vec<String> = resolver.resolve(&key, compute).expect("first");
        let second: Vec<String> = resolver
            .resolve(&key, || -> Result<Vec<String>> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .expect("second");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(second, first);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let resolver = MemoizedResolver::in_memory().expect("resolver");
        let key = root_key("mc20_13TeV");

        let err = resolver
            .resolve::<Vec<String>, _>(&key, || Err(CatalogError::transport("boom", "")))
            .expect_err("should fail");
        assert!(err.is_retryable());
        assert!(!resolver.contains(&key).expect("contains"));

        let value: Vec<String> = resolver
            .resolve(&key, || Ok(vec!["x".to_string()]))
            .expect("retry");
        assert_eq!(value, vec!["x"]);
    }

    #[test]
    fn test_hit_is_served_when_hit_count_cannot_be_written() {
        let store = CacheStore::open_in_memory().expect("store");
        let key = root_key("mc20_13TeV");
        store.put(&key, r#"["cached"]"#).expect("put");
        store
            .conn
            .execute_batch("PRAGMA query_only = ON")
            .expect("read-only");
        assert!(store.record_hit(&key).is_err());
        let resolver = MemoizedResolver::new(store);

        let value: Vec<String> = resolver
            .resolve(&key, || Err(CatalogError::transport("must not run", "")))
            .expect("cached value");
        assert_eq!(value, vec!["cached"]);
    }

    #[test]
    fn test_undecodable_entry_is_recomputed() {
        let store = CacheStore::open_in_memory().expect("store");
        let key = root_key("mc20_13TeV");
        store.put(&key, r#"{"not":"a list"}"#).expect("put");
        let resolver = MemoizedResolver::new(store);

        let value: Vec<String> = resolver
            .resolve(&key, || Ok(vec!["fresh".to_string()]))
            .expect("resolve");
        assert_eq!(value, vec!["fresh"]);
    }

    #[test]
    fn test_concurrent_callers_share_one_computation() {
        let resolver = MemoizedResolver::in_memory().expect("resolver");
        let key = root_key("mc23_13p6TeV");
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let value: Vec<String> = resolver
                        .resolve(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(vec!["Top".to_string()])
                        })
                        .expect("resolve");
                    assert_eq!(value, vec!["Top"]);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.db");
        let key = root_key("mc20_13TeV");

        {
            let resolver = MemoizedResolver::new(CacheStore::open_at_path(&path).expect("open"));
            let _: Vec<String> = resolver
                .resolve(&key, || Ok(vec!["Top".to_string()]))
                .expect("resolve");
        }

        let resolver = MemoizedResolver::new(CacheStore::open_at_path(&path).expect("reopen"));
        let value: Vec<String> = resolver
            .resolve(&key, || Err(CatalogError::transport("must not be called", "")))
            .expect("cached");
        assert_eq!(value, vec!["Top"]);
    }
}
