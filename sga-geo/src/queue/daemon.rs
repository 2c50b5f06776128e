//! Geocode daemon: drains the request queue into the provider chain.
//!
//! ```text
//! PendingRequest ──► ┌──────────────┐
//!                    │  Abandoned?  │──► Yes ──► drop (cancelled)
//!                    └──────┬───────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │  Semaphore   │  at most `max_concurrent` in flight
//!                    └──────┬───────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │ Cache check  │──► Hit ──► answer, release slot
//!                    └──────┬───────┘
//!                           │ Miss
//!                           ▼
//!                    ┌──────────────┐
//!                    │    Pacer     │  ≥ `min_spacing` between starts
//!                    └──────┬───────┘
//!                           ▼
//!                    spawn: ProviderChain::resolve ──► cache write ──► answer
//! ```
//!
//! Requests are taken off the channel one at a time, so admission is FIFO.
//! Completions happen in any order.
//!
//! # Example
//!
//! ```ignore
//! let (daemon, request_tx) = GeocodeDaemon::new(QueueConfig::default(), chain, cache);
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! let (request, response_rx) = PendingRequest::new(coordinate, CancellationToken::new());
//! request_tx.send(request).await?;
//! let response = response_rx.await?;
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::pacer::RequestPacer;
use super::{PendingRequest, QueueConfig, QueueMetrics};
use crate::cache::GeocodeCache;
use crate::provider::{ChainOutcome, ProviderChain};

/// Provider label used when a queued request was satisfied by the cache.
pub(crate) const CACHE_SOURCE: &str = "cache";

/// The geocode queue daemon.
///
/// Owns the receiving end of the request channel and runs as a long-lived
/// background task.
pub struct GeocodeDaemon {
    config: QueueConfig,
    chain: Arc<ProviderChain>,
    cache: Arc<GeocodeCache>,
    metrics: Arc<QueueMetrics>,
    request_rx: mpsc::Receiver<PendingRequest>,
}

impl GeocodeDaemon {
    /// Creates a new daemon with its channel.
    ///
    /// Returns the daemon and a sender that can be cloned for producers.
    pub fn new(
        config: QueueConfig,
        chain: Arc<ProviderChain>,
        cache: Arc<GeocodeCache>,
    ) -> (Self, mpsc::Sender<PendingRequest>) {
        let (request_tx, request_rx) = mpsc::channel(config.channel_capacity);
        let daemon = Self {
            config,
            chain,
            cache,
            metrics: Arc::new(QueueMetrics::new()),
            request_rx,
        };
        (daemon, request_tx)
    }

    /// Shared handle to the daemon's counters.
    pub fn metrics(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs the daemon until shutdown is signalled or every sender is dropped.
    ///
    /// Requests still queued at shutdown are dropped; their callers see a
    /// closed response channel. Resolutions already running finish on their
    /// own tasks.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            max_concurrent = self.config.max_concurrent,
            min_spacing_ms = self.config.min_spacing.as_millis() as u64,
            providers = ?self.chain.names(),
            "Geocode daemon starting"
        );

        let Self {
            config,
            chain,
            cache,
            metrics,
            mut request_rx,
        } = self;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let mut pacer = RequestPacer::new(config.min_spacing);

        loop {
            let request = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Geocode daemon shutting down");
                    break;
                }

                request = request_rx.recv() => match request {
                    Some(request) => request,
                    None => {
                        debug!("All request senders dropped");
                        break;
                    }
                },
            };

            if request.is_abandoned() {
                debug!(coordinate = %request.coordinate, "Request already cancelled");
                metrics.record_cancelled();
                continue;
            }

            // Wait for a free slot.
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // An earlier request for the same key may have finished meanwhile.
            let request = match Self::answer_from_cache(request, &cache, &metrics) {
                Some(request) => request,
                None => continue,
            };

            if request.is_abandoned() {
                metrics.record_cancelled();
                debug!(coordinate = %request.coordinate, "Request abandoned while waiting for a slot");
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = pacer.wait() => {}
            }

            // Unclaimed, so the next request can start right away.
            if request.is_abandoned() {
                metrics.record_cancelled();
                debug!(coordinate = %request.coordinate, "Request abandoned while waiting");
                continue;
            }

            pacer.claim();

            Self::dispatch(request, permit, &chain, &cache, &metrics);
        }

        info!(stats = ?metrics.snapshot(), "Geocode daemon stopped");
    }

    /// Answers from the cache if an earlier request resolved the same key
    /// while this one was waiting. Returns the request back on a miss.
    fn answer_from_cache(
        request: PendingRequest,
        cache: &GeocodeCache,
        metrics: &QueueMetrics,
    ) -> Option<PendingRequest> {
        match cache.peek(&request.coordinate.cache_key()) {
            Some(address) => {
                debug!(coordinate = %request.coordinate, "Cache hit at dispatch");
                metrics.record_cache_hit();
                request.respond(
                    ChainOutcome::Resolved {
                        address,
                        provider: CACHE_SOURCE.to_string(),
                        position: 0,
                    },
                    true,
                );
                None
            }
            None => Some(request),
        }
    }

    fn dispatch(
        request: PendingRequest,
        permit: OwnedSemaphorePermit,
        chain: &Arc<ProviderChain>,
        cache: &Arc<GeocodeCache>,
        metrics: &Arc<QueueMetrics>,
    ) {
        let chain = Arc::clone(chain);
        let cache = Arc::clone(cache);
        let metrics = Arc::clone(metrics);

        metrics.record_dispatch();
        debug!(
            coordinate = %request.coordinate,
            waited_ms = request.enqueued_at.elapsed().as_millis() as u64,
            in_flight = metrics.in_flight(),
            "Dispatching geocode request"
        );

        tokio::spawn(async move {
            let outcome = chain
                .resolve(request.coordinate, &request.cancellation)
                .await;

            match &outcome {
                ChainOutcome::Resolved {
                    address, provider, ..
                } => {
                    debug!(coordinate = %request.coordinate, provider = %provider, "Resolved");
                    cache.insert(request.coordinate.cache_key(), address.clone());
                }
                ChainOutcome::Cancelled => metrics.record_cancelled(),
                ChainOutcome::Exhausted => {}
            }

            metrics.record_completion();
            drop(permit);
            request.respond(outcome, false);
        });
    }
}
