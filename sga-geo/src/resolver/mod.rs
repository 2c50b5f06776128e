//! Coordinate to address resolution.
//!
//! [`GeocodeResolver`] is the entry point of the crate. It owns:
//!
//! - a [`GeocodeCache`] (memory map with TTL, persisted by a maintenance daemon)
//! - a [`GeocodeDaemon`] draining the rate-limited request queue into the
//!   [`ProviderChain`]
//! - the one-time fallback notice flag
//!
//! ```text
//! resolve(lat, lon)
//!     │
//!     ├─► cache hit ─────────────────────────────► address
//!     │
//!     └─► miss ─► queue ─► daemon ─► providers ─┬─► address (cached)
//!                                               └─► "{lat:.4}, {lon:.4}" (not cached)
//! ```
//!
//! Nothing is global: every resolver has its own cache, queue and flag, so
//! several can coexist in one process.
//!
//! # Example
//!
//! ```ignore
//! use sga_geo::config::ConfigFile;
//! use sga_geo::resolver::GeocodeResolver;
//!
//! let config = ConfigFile::load_or_default("sga-geo.ini")?;
//! let resolver = GeocodeResolver::from_config(&config).await?;
//!
//! let address = resolver.resolve(-22.0175, -47.8908).await;
//! resolver.shutdown().await;
//! ```

mod error;
mod notice;

pub use error::ResolverError;
pub use notice::{
    FallbackNotice, FallbackNotifier, LogNotifier, FALLBACK_NOTICE_DESCRIPTION,
    FALLBACK_NOTICE_TITLE,
};

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheMaintenance, CacheStats, GeocodeCache, MaintenanceConfig};
use crate::clock::SystemClock;
use crate::config::GeocoderConfig;
use crate::coord::Coordinate;
use crate::provider::{ChainOutcome, ProviderChain, ReqwestClient};
use crate::queue::{GeocodeDaemon, PendingRequest, QueueConfig, QueueMetrics, QueueStats};
use crate::store::StoreError;
use notice::NoticeGate;

/// Options for [`GeocodeResolver::start`].
#[derive(Clone)]
pub struct ResolverOptions {
    pub queue: QueueConfig,
    pub maintenance: MaintenanceConfig,
    /// Receives the one-time fallback notice. `None` disables it.
    pub notifier: Option<Arc<dyn FallbackNotifier>>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            maintenance: MaintenanceConfig::default(),
            notifier: Some(Arc::new(LogNotifier)),
        }
    }
}

impl ResolverOptions {
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_maintenance(mut self, maintenance: MaintenanceConfig) -> Self {
        self.maintenance = maintenance;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FallbackNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn without_notifier(mut self) -> Self {
        self.notifier = None;
        self
    }
}

/// Snapshot of resolver activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub cache: CacheStats,
    pub queue: QueueStats,
    /// Requests waiting in the channel, not yet taken by the daemon.
    pub queued: usize,
}

/// Reverse-geocoding service with cache, queue and provider fallback.
pub struct GeocodeResolver {
    cache: Arc<GeocodeCache>,
    request_tx: mpsc::Sender<PendingRequest>,
    metrics: Arc<QueueMetrics>,
    notice: NoticeGate,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GeocodeResolver {
    /// Starts the queue and maintenance daemons and returns the resolver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(chain: ProviderChain, cache: GeocodeCache, options: ResolverOptions) -> Self {
        let cache = Arc::new(cache);
        let shutdown = CancellationToken::new();

        info!(
            providers = ?chain.names(),
            cached_entries = cache.len(),
            "Starting geocode resolver"
        );

        let (daemon, request_tx) =
            GeocodeDaemon::new(options.queue, Arc::new(chain), Arc::clone(&cache));
        let metrics = daemon.metrics();
        let maintenance = CacheMaintenance::new(Arc::clone(&cache), options.maintenance);

        let tasks = vec![
            tokio::spawn(daemon.run(shutdown.clone())),
            tokio::spawn(maintenance.run(shutdown.clone())),
        ];

        Self {
            cache,
            request_tx,
            metrics,
            notice: NoticeGate::new(options.notifier),
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    /// Builds the production resolver: Geoapify then Nominatim over reqwest,
    /// cache loaded from the configured store.
    pub async fn from_config(config: &GeocoderConfig) -> Result<Self, ResolverError> {
        let http = ReqwestClient::new()?;
        let chain = config.build_chain(http);

        let store = config.open_store().await?;
        let cache = GeocodeCache::load(store, Arc::new(SystemClock), config.cache.ttl).await;

        let mut options = ResolverOptions::default()
            .with_queue(config.queue.clone())
            .with_maintenance(config.maintenance());
        if !config.geocoding.notify_on_fallback {
            options = options.without_notifier();
        }

        Ok(Self::start(chain, cache, options))
    }

    /// Resolves a coordinate to a short address.
    ///
    /// Never fails: if no provider answers, returns `"{lat:.4}, {lon:.4}"`.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> String {
        self.resolve_coordinate(Coordinate::new(latitude, longitude))
            .await
    }

    /// [`resolve`](Self::resolve) taking a [`Coordinate`].
    pub async fn resolve_coordinate(&self, coordinate: Coordinate) -> String {
        match self
            .resolve_cancellable(coordinate, CancellationToken::new())
            .await
        {
            Ok(address) => address,
            Err(e) => {
                debug!(%coordinate, error = %e, "Falling back to coordinate label");
                coordinate.fallback_label()
            }
        }
    }

    /// Resolves a coordinate unless `cancellation` fires first.
    ///
    /// Cancelling affects only this request. A resolution that already
    /// reached a provider is aborted and nothing is cached for it.
    pub async fn resolve_cancellable(
        &self,
        coordinate: Coordinate,
        cancellation: CancellationToken,
    ) -> Result<String, ResolverError> {
        let key = coordinate.cache_key();
        if let Some(address) = self.cache.get(&key) {
            debug!(%coordinate, "Cache hit");
            return Ok(address);
        }

        if cancellation.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }

        let (request, response_rx) = PendingRequest::new(coordinate, cancellation.clone());

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(ResolverError::Cancelled),
            sent = self.request_tx.send(request) => {
                sent.map_err(|_| ResolverError::ShutDown)?;
            }
        }

        let response = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(ResolverError::Cancelled),
            response = response_rx => match response {
                Ok(response) => response,
                Err(_) if cancellation.is_cancelled() => return Err(ResolverError::Cancelled),
                Err(_) => return Err(ResolverError::ShutDown),
            },
        };

        match response.outcome {
            ChainOutcome::Resolved {
                address,
                provider,
                position,
            } => {
                if position > 0 {
                    self.notice.trigger(coordinate, Some(&provider));
                }
                debug!(
                    %coordinate,
                    provider = %provider,
                    cache_hit = response.cache_hit,
                    duration_ms = response.duration.as_millis() as u64,
                    "Resolved address"
                );
                Ok(address)
            }
            ChainOutcome::Exhausted => {
                warn!(%coordinate, "All geocoding providers failed");
                self.notice.trigger(coordinate, None);
                Ok(coordinate.fallback_label())
            }
            ChainOutcome::Cancelled => Err(ResolverError::Cancelled),
        }
    }

    /// Persists the cache now if it has unsaved changes.
    pub async fn flush(&self) -> Result<bool, StoreError> {
        self.cache.flush().await
    }

    /// Drops every cached address and persists the empty cache.
    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        self.cache.clear();
        self.cache.flush().await.map(|_| ())
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache: self.cache.stats(),
            queue: self.metrics.snapshot(),
            queued: self
                .request_tx
                .max_capacity()
                .saturating_sub(self.request_tx.capacity()),
        }
    }

    /// The resolver's cache.
    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    /// Stops the daemons and waits for the final cache flush.
    ///
    /// Requests still queued are answered with
    /// [`ResolverError::ShutDown`] (or the coordinate label via `resolve`).
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Resolver task failed");
            }
        }
        info!(stats = ?self.stats(), "Geocode resolver stopped");
    }
}

impl Drop for GeocodeResolver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
