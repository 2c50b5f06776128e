//! Library configuration.
//!
//! [`GeocoderConfig`] collects every tunable in one place. Defaults match the
//! production clients; [`ConfigFile`] loads overrides from an INI file and the
//! environment.

mod file;

pub use file::{ConfigError, ConfigFile, ENV_API_KEY, ENV_CACHE_DIR};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    MaintenanceConfig, RouteCacheService, DEFAULT_FLUSH_INTERVAL, DEFAULT_GEOCODE_TTL,
    DEFAULT_PURGE_INTERVAL, DEFAULT_ROUTE_TTL,
};
use crate::clock::SystemClock;
use crate::provider::{
    AsyncHttpClient, GeoapifyProvider, NominatimProvider, ProviderChain,
    DEFAULT_GEOAPIFY_TIMEOUT, DEFAULT_NOMINATIM_TIMEOUT, DEFAULT_USER_AGENT,
};
use crate::queue::QueueConfig;
use crate::routing::{
    RouteClient, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, DEFAULT_ROUTING_TIMEOUT,
};
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Name of the cache subdirectory under the platform cache dir.
pub const CACHE_DIR_NAME: &str = "sga-geo";

/// Default persisted-cache location: `<platform cache dir>/sga-geo`.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(CACHE_DIR_NAME))
}

/// Provider settings.
#[derive(Clone, Debug)]
pub struct GeocodingConfig {
    /// Geoapify key. Without one the primary provider is skipped.
    pub geoapify_api_key: Option<String>,
    /// `lang` sent to Geoapify.
    pub language: String,
    pub geoapify_timeout: Duration,
    pub nominatim_timeout: Duration,
    pub user_agent: String,
    /// `accept-language` sent to Nominatim.
    pub nominatim_language: String,
    /// Emit the one-time notice when a fallback tier answers.
    pub notify_on_fallback: bool,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            geoapify_api_key: None,
            language: "pt".to_string(),
            geoapify_timeout: DEFAULT_GEOAPIFY_TIMEOUT,
            nominatim_timeout: DEFAULT_NOMINATIM_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nominatim_language: "pt-BR".to_string(),
            notify_on_fallback: true,
        }
    }
}

/// Cache persistence and expiry.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Where persisted caches live. `None` keeps everything in memory.
    pub directory: Option<PathBuf>,
    pub ttl: Duration,
    pub flush_interval: Duration,
    pub purge_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            ttl: DEFAULT_GEOCODE_TTL,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

/// Routing client settings.
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub route_ttl: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_ROUTING_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_BASE_DELAY,
            route_ttl: DEFAULT_ROUTE_TTL,
        }
    }
}

/// Top-level configuration passed to
/// [`GeocodeResolver::from_config`](crate::resolver::GeocodeResolver::from_config).
#[derive(Clone, Debug, Default)]
pub struct GeocoderConfig {
    pub geocoding: GeocodingConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub routing: RoutingConfig,
}

impl GeocoderConfig {
    /// Set the Geoapify API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.geocoding.geoapify_api_key = Some(key.into());
        self
    }

    /// Persist caches under `directory`.
    pub fn with_cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache.directory = Some(directory.into());
        self
    }

    /// Keep caches in memory only.
    pub fn without_persistence(mut self) -> Self {
        self.cache.directory = None;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_notify_on_fallback(mut self, notify: bool) -> Self {
        self.geocoding.notify_on_fallback = notify;
        self
    }

    /// Maintenance timers for the geocode cache.
    pub fn maintenance(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            flush_interval: self.cache.flush_interval,
            purge_interval: self.cache.purge_interval,
        }
    }

    /// Geoapify then Nominatim, sharing one HTTP client.
    pub fn build_chain<C>(&self, http: C) -> ProviderChain
    where
        C: AsyncHttpClient + Clone + 'static,
    {
        let geo = &self.geocoding;
        let geoapify = GeoapifyProvider::new(http.clone(), geo.geoapify_api_key.clone())
            .with_timeout(geo.geoapify_timeout)
            .with_language(geo.language.clone());
        let nominatim = NominatimProvider::new(http, geo.user_agent.clone())
            .with_timeout(geo.nominatim_timeout)
            .with_accept_language(geo.nominatim_language.clone());

        ProviderChain::new()
            .with_provider(Arc::new(geoapify))
            .with_provider(Arc::new(nominatim))
    }

    /// Opens the configured store: a [`FileStore`] if a directory is set,
    /// otherwise a [`MemoryStore`].
    pub async fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        match &self.cache.directory {
            Some(directory) => Ok(Arc::new(FileStore::open(directory.clone()).await?)),
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }

    /// Route cache over `store` with the configured TTL.
    pub fn route_cache(&self, store: Arc<dyn KeyValueStore>) -> RouteCacheService {
        RouteCacheService::new(store, Arc::new(SystemClock)).with_ttl(self.routing.route_ttl)
    }

    /// Routing client with a route cache over `store`.
    pub fn build_route_client<C: AsyncHttpClient>(
        &self,
        http: C,
        store: Arc<dyn KeyValueStore>,
    ) -> RouteClient<C> {
        RouteClient::new(http, self.geocoding.geoapify_api_key.clone())
            .with_cache(Arc::new(self.route_cache(store)))
            .with_timeout(self.routing.timeout)
            .with_max_retries(self.routing.max_retries)
            .with_retry_delay(self.routing.retry_delay)
            .with_language(self.geocoding.language.clone())
    }
}
