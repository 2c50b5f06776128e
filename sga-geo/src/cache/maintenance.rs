//! Background flush and purge for the geocode cache.
//!
//! [`CacheMaintenance`] is a long-running task that:
//! - Flushes the cache to its store when dirty (default every 30s)
//! - Purges expired entries (default every 15 min)
//! - Performs a final flush when shutdown is signalled
//!
//! # Example
//!
//! ```ignore
//! let maintenance = CacheMaintenance::new(Arc::clone(&cache), MaintenanceConfig::default());
//! let shutdown = CancellationToken::new();
//! let handle = tokio::spawn(maintenance.run(shutdown.clone()));
//!
//! // later
//! shutdown.cancel();
//! handle.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::geocode::GeocodeCache;

/// Default interval between dirty checks.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Default interval between expiry sweeps.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Timer settings for [`CacheMaintenance`].
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    pub flush_interval: Duration,
    pub purge_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

/// Maintenance daemon for a [`GeocodeCache`].
pub struct CacheMaintenance {
    cache: Arc<GeocodeCache>,
    config: MaintenanceConfig,
}

impl CacheMaintenance {
    pub fn new(cache: Arc<GeocodeCache>, config: MaintenanceConfig) -> Self {
        Self { cache, config }
    }

    /// Runs until `shutdown` is cancelled, then flushes one last time.
    pub async fn run(self, shutdown: CancellationToken) {
        debug!(
            flush_secs = self.config.flush_interval.as_secs(),
            purge_secs = self.config.purge_interval.as_secs(),
            "Cache maintenance starting"
        );

        let start = tokio::time::Instant::now();
        let mut flush_timer = tokio::time::interval_at(
            start + self.config.flush_interval,
            self.config.flush_interval,
        );
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut purge_timer = tokio::time::interval_at(
            start + self.config.purge_interval,
            self.config.purge_interval,
        );
        purge_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = purge_timer.tick() => {
                    let removed = self.cache.purge_expired();
                    if removed > 0 {
                        info!(removed, remaining = self.cache.len(), "Purged expired geocode entries");
                    }
                }

                _ = flush_timer.tick() => self.flush().await,
            }
        }

        self.flush().await;
        debug!("Cache maintenance stopped");
    }

    async fn flush(&self) {
        if let Err(e) = self.cache.flush().await {
            warn!(error = %e, "Failed to persist geocode cache");
        }
    }
}
