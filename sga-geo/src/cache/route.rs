//! Persisted origin→destination route cache.
//!
//! Each route is stored under its own key
//! `route_cache_{lat}_{lon}_to_{lat}_{lon}` with coordinates rounded to four
//! decimals. There is no memory tier. Every operation is best-effort: store
//! failures are logged and reported as a miss or a no-op.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::clock::{age_millis, Clock, SystemClock};
use crate::coord::Coordinate;
use crate::routing::RouteResult;
use crate::store::KeyValueStore;

/// Prefix shared by every route cache key.
pub const ROUTE_CACHE_PREFIX: &str = "route_cache_";

/// Default route lifetime (30 days).
pub const DEFAULT_ROUTE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Persisted form of a cached route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCacheEntry {
    /// Epoch milliseconds when the route was saved.
    pub timestamp: u64,
    pub route: RouteResult,
}

/// Store key for a route.
pub fn route_cache_key(origin: Coordinate, destination: Coordinate) -> String {
    format!(
        "{}{}_to_{}",
        ROUTE_CACHE_PREFIX,
        origin.route_key(),
        destination.route_key()
    )
}

/// Route cache over a [`KeyValueStore`].
pub struct RouteCacheService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RouteCacheService {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: DEFAULT_ROUTE_TTL,
        }
    }

    /// Route cache on the system clock.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached route unless absent, unreadable or older than the TTL.
    ///
    /// A stale entry is deleted.
    pub async fn get_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Option<RouteResult> {
        let key = route_cache_key(origin, destination);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached route");
                return None;
            }
        };

        let entry: RouteCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached route");
                return None;
            }
        };

        let age = age_millis(self.clock.now_millis(), entry.timestamp);
        if u128::from(age) > self.ttl.as_millis() {
            debug!(key = %key, age_ms = age, "Cached route expired");
            if let Err(e) = self.store.remove(&key).await {
                warn!(key = %key, error = %e, "Failed to remove expired route");
            }
            return None;
        }

        Some(entry.route)
    }

    /// Saves a route stamped with the current time, replacing any previous one.
    pub async fn save_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        route: &RouteResult,
    ) {
        let key = route_cache_key(origin, destination);
        let entry = RouteCacheEntry {
            timestamp: self.clock.now_millis(),
            route: route.clone(),
        };

        let result = match serde_json::to_string(&entry) {
            Ok(json) => self.store.set(&key, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Failed to save route to cache");
        }
    }

    /// Removes every cached route. Returns how many were removed.
    ///
    /// Keys outside the route prefix are left alone.
    pub async fn clear_cache(&self) -> usize {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to clear route cache");
                return 0;
            }
        };

        let route_keys: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(ROUTE_CACHE_PREFIX))
            .collect();

        match self.store.remove_many(&route_keys).await {
            Ok(removed) => {
                debug!(removed, "Cleared route cache");
                removed
            }
            Err(e) => {
                error!(error = %e, "Failed to clear route cache");
                0
            }
        }
    }
}
