//! Rate-limited request queue in front of the provider chain.
//!
//! Cache misses become [`PendingRequest`]s sent over a FIFO channel to the
//! [`GeocodeDaemon`]. The daemon admits requests in order, keeps at most
//! `max_concurrent` provider resolutions running, and spaces dispatch starts
//! by at least `min_spacing`.

mod daemon;
mod pacer;

pub use daemon::GeocodeDaemon;
pub use pacer::RequestPacer;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coord::Coordinate;
use crate::provider::ChainOutcome;

/// Default cap on concurrent provider resolutions.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default minimum gap between dispatch starts.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(220);

/// Default request channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Configuration for the geocode daemon.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub min_spacing: Duration,
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            min_spacing: DEFAULT_MIN_SPACING,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Sets the concurrency cap. Zero is raised to one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.min_spacing = min_spacing;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// What the daemon sends back for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeResponse {
    pub outcome: ChainOutcome,
    /// Answered from the cache at dispatch time, no provider called.
    pub cache_hit: bool,
    /// Time from enqueue to answer.
    pub duration: Duration,
}

/// A cache miss waiting for a provider resolution.
#[derive(Debug)]
pub struct PendingRequest {
    pub coordinate: Coordinate,
    pub cancellation: CancellationToken,
    pub response_tx: oneshot::Sender<GeocodeResponse>,
    pub enqueued_at: Instant,
}

impl PendingRequest {
    /// Creates a request and the receiver its answer arrives on.
    pub fn new(
        coordinate: Coordinate,
        cancellation: CancellationToken,
    ) -> (Self, oneshot::Receiver<GeocodeResponse>) {
        let (response_tx, response_rx) = oneshot::channel();
        let request = Self {
            coordinate,
            cancellation,
            response_tx,
            enqueued_at: Instant::now(),
        };
        (request, response_rx)
    }

    /// True if nobody is waiting for the answer any more.
    pub fn is_abandoned(&self) -> bool {
        self.cancellation.is_cancelled() || self.response_tx.is_closed()
    }

    /// Answers the request. A caller that went away is ignored.
    pub fn respond(self, outcome: ChainOutcome, cache_hit: bool) {
        let response = GeocodeResponse {
            outcome,
            cache_hit,
            duration: self.enqueued_at.elapsed(),
        };
        let _ = self.response_tx.send(response);
    }
}

/// Live counters shared between the daemon and its owner.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    dispatched: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    cache_hits: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> QueueStats {
        QueueStats {
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub in_flight: usize,
    /// Highest in-flight count observed.
    pub peak_in_flight: usize,
    pub dispatched: u64,
    pub completed: u64,
    /// Requests dropped before dispatch or aborted mid-resolution.
    pub cancelled: u64,
    /// Requests answered from the cache at dispatch time.
    pub cache_hits: u64,
}
