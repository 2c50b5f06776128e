//! SGA Geo - reverse geocoding and route caching for the SGA clients
//!
//! This library turns `(latitude, longitude)` pairs into short, human-readable
//! addresses and caches driving routes between coordinates.
//!
//! - [`resolver`]: the [`GeocodeResolver`] facade (cache, rate-limited queue,
//!   provider fallback, degraded coordinate label)
//! - [`provider`]: Geoapify and Nominatim reverse geocoding behind a common trait
//! - [`queue`]: the FIFO daemon enforcing the concurrency cap and request spacing
//! - [`cache`]: the TTL geocode cache and the persisted route cache
//! - [`routing`]: the Geoapify routing client
//! - [`store`]: persisted key-value storage
//! - [`config`] and [`logging`]: ambient setup

pub mod cache;
pub mod clock;
pub mod config;
pub mod coord;
pub mod logging;
pub mod provider;
pub mod queue;
pub mod resolver;
pub mod routing;
pub mod store;

use std::future::Future;
use std::pin::Pin;

pub use config::{ConfigFile, GeocoderConfig};
pub use coord::Coordinate;
pub use resolver::{GeocodeResolver, ResolverError, ResolverOptions};
pub use routing::{RouteClient, RouteResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
