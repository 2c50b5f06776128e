//! In-memory geocode cache with TTL and write-behind persistence.
//!
//! Entries live in a `DashMap` keyed by [`Coordinate::cache_key`]. Inserts
//! mark the cache dirty; [`GeocodeCache::flush`] writes the whole map as one
//! JSON object under [`GEOCODE_CACHE_KEY`]. The maintenance daemon calls it
//! on a timer.
//!
//! An entry is fresh while `now - resolvedAt < ttl`. Stale entries are
//! dropped when loaded, when read, and by [`GeocodeCache::purge_expired`].
//!
//! [`Coordinate::cache_key`]: crate::coord::Coordinate::cache_key

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{age_millis, Clock, SystemClock};
use crate::store::{KeyValueStore, MemoryStore, StoreError};

/// Store key holding the serialized cache map.
pub const GEOCODE_CACHE_KEY: &str = "geocode_cache";

/// Default lifetime of a resolved address (5 days).
pub const DEFAULT_GEOCODE_TTL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// A resolved address and when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub address: String,
    /// Epoch milliseconds.
    pub resolved_at: u64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses, {} expired",
            self.entries, self.hits, self.misses, self.expired
        )
    }
}

/// Coordinate-keyed address cache.
pub struct GeocodeCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
    dirty: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl fmt::Debug for GeocodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodeCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl GeocodeCache {
    /// Creates an empty cache persisting to `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            store,
            dirty: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Non-persistent cache with the system clock and default TTL.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            DEFAULT_GEOCODE_TTL,
        )
    }

    /// Creates a cache and fills it from `store`, skipping stale entries.
    ///
    /// A missing, unreadable or corrupt blob is logged and yields an empty
    /// cache.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        let cache = Self::new(store, clock, ttl);
        match cache.read_persisted().await {
            Ok(Some(map)) => {
                let total = map.len();
                let now = cache.clock.now_millis();
                for (key, entry) in map {
                    if cache.is_fresh(&entry, now) {
                        cache.entries.insert(key, entry);
                    }
                }
                let kept = cache.entries.len();
                if kept < total {
                    // Drop the stale entries from the persisted copy too.
                    cache.dirty.store(true, Ordering::Release);
                }
                info!(kept, discarded = total - kept, "Loaded geocode cache");
            }
            Ok(None) => debug!("No persisted geocode cache"),
            Err(e) => warn!(error = %e, "Failed to load geocode cache, starting empty"),
        }
        cache
    }

    async fn read_persisted(&self) -> Result<Option<BTreeMap<String, CacheEntry>>, StoreError> {
        match self.store.get(GEOCODE_CACHE_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: u64) -> bool {
        u128::from(age_millis(now, entry.resolved_at)) < self.ttl.as_millis()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached address if present and fresh.
    ///
    /// A stale entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        let found = self.entries.get(key).map(|e| e.value().clone());

        match found {
            Some(entry) if self.is_fresh(&entry, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.address)
            }
            Some(_) => {
                let removed = self
                    .entries
                    .remove_if(key, |_, e| !self.is_fresh(e, now))
                    .is_some();
                if removed {
                    self.expired.fetch_add(1, Ordering::Relaxed);
                    self.dirty.store(true, Ordering::Release);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Fresh address for `key` without touching hit/miss counters or
    /// evicting stale entries.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        self.entries
            .get(key)
            .filter(|e| self.is_fresh(e.value(), now))
            .map(|e| e.value().address.clone())
    }

    /// Stores an address resolved now.
    pub fn insert(&self, key: impl Into<String>, address: impl Into<String>) {
        let entry = CacheEntry {
            address: address.into(),
            resolved_at: self.clock.now_millis(),
        };
        self.entries.insert(key.into(), entry);
        self.dirty.store(true, Ordering::Release);
    }

    /// Removes every stale entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, e| self.is_fresh(e, now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            self.dirty.store(true, Ordering::Release);
        }
        removed
    }

    /// Drops every entry. The empty map is persisted on the next flush.
    pub fn clear(&self) {
        self.entries.clear();
        self.dirty.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if memory has changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }

    /// Ordered copy of the current entries.
    pub fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Persists the map if it changed since the last flush.
    ///
    /// Returns `Ok(true)` if a write happened. On failure the cache stays
    /// dirty so the next flush retries.
    pub async fn flush(&self) -> Result<bool, StoreError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let snapshot = self.snapshot();
        let result = match serde_json::to_string(&snapshot) {
            Ok(json) => self.store.set(GEOCODE_CACHE_KEY, json).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                debug!(entries = snapshot.len(), "Flushed geocode cache");
                Ok(true)
            }
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }
}
