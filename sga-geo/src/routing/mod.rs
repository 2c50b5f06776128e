//! Driving routes between two coordinates.
//!
//! [`RouteClient`] wraps the Geoapify routing API behind a
//! [`RouteCacheService`](crate::cache::RouteCacheService): cached routes are
//! returned without a request, fresh ones are normalized into a
//! [`RouteResult`] and stored.

mod client;
mod instructions;
mod types;

pub use client::{
    RouteClient, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY, DEFAULT_ROUTING_TIMEOUT,
    GEOAPIFY_ROUTING_URL,
};
pub use instructions::{is_translatable, localize, translate};
pub use types::{RouteInstruction, RoutePoint, RouteResult, RoutingError};
