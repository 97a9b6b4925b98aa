//! Time-bounded metadata caches
//!
//! Both caches are moka caches with a `time_to_live` and an entry bound.
//! Each value also carries the instant it was stored at, and a lookup older
//! than the TTL counts as a miss and drops the entry, so expiry follows the
//! tokio clock as well as moka's own. Not-found results are never cached.

use std::time::Duration;

use moka::sync::Cache;
use tokio::time::Instant;

use super::attributes::FileAttributes;

/// Upper bound on entries held by each metadata cache
pub const MAX_ENTRIES: u64 = 100_000;

fn build<V>(ttl: Duration) -> Cache<String, (V, Instant)>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(MAX_ENTRIES)
        .time_to_live(ttl)
        .build()
}

fn get_fresh<V>(cache: &Cache<String, (V, Instant)>, ttl: Duration, key: &str) -> Option<V>
where
    V: Clone + Send + Sync + 'static,
{
    let (value, stored_at) = cache.get(key)?;
    if stored_at.elapsed() < ttl {
        return Some(value);
    }

    tracing::trace!("cache entry for {} expired", key);
    cache.invalidate(key);
    None
}

fn entry_count<V>(cache: &Cache<String, (V, Instant)>) -> u64
where
    V: Clone + Send + Sync + 'static,
{
    cache.run_pending_tasks();
    cache.entry_count()
}

/// Path → attributes, expiring after the attribute TTL
pub struct AttributeCache {
    ttl: Duration,
    entries: Cache<String, (FileAttributes, Instant)>,
}

impl AttributeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: build(ttl),
        }
    }

    pub fn get(&self, path: &str) -> Option<FileAttributes> {
        get_fresh(&self.entries, self.ttl, path)
    }

    pub fn put(&self, path: &str, attrs: FileAttributes) {
        self.entries
            .insert(path.to_string(), (attrs, Instant::now()));
    }

    pub fn invalidate(&self, path: &str) {
        self.entries.invalidate(path);
    }

    /// Number of stored entries, including ones not yet found stale
    pub fn len(&self) -> u64 {
        entry_count(&self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directory path → ordered child names, expiring after the directory TTL
pub struct DirectoryCache {
    ttl: Duration,
    entries: Cache<String, (Vec<String>, Instant)>,
}

impl DirectoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: build(ttl),
        }
    }

    pub fn get(&self, dir_path: &str) -> Option<Vec<String>> {
        get_fresh(&self.entries, self.ttl, dir_path)
    }

    pub fn put(&self, dir_path: &str, names: Vec<String>) {
        self.entries
            .insert(dir_path.to_string(), (names, Instant::now()));
    }

    pub fn invalidate(&self, dir_path: &str) {
        self.entries.invalidate(dir_path);
    }

    pub fn len(&self) -> u64 {
        entry_count(&self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
