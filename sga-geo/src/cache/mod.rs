//! Caches for geocoding and routing results.
//!
//! - [`GeocodeCache`]: memory map with TTL, persisted as one blob by the
//!   [`CacheMaintenance`] daemon
//! - [`RouteCacheService`]: one persisted entry per route, no memory tier

mod geocode;
mod maintenance;
mod route;

pub use geocode::{CacheEntry, CacheStats, GeocodeCache, DEFAULT_GEOCODE_TTL, GEOCODE_CACHE_KEY};
pub use maintenance::{
    CacheMaintenance, MaintenanceConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_PURGE_INTERVAL,
};
pub use route::{
    route_cache_key, RouteCacheEntry, RouteCacheService, DEFAULT_ROUTE_TTL, ROUTE_CACHE_PREFIX,
};
