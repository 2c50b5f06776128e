//! Route result types and routing errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderError;

/// One vertex of a route polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A turn-by-turn step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInstruction {
    /// Instruction text, translated to Portuguese when it starts with a
    /// known English verb.
    pub instruction: String,
    /// Step length in meters.
    pub distance: Option<f64>,
    /// Step duration in seconds.
    pub duration: Option<f64>,
}

/// A normalized driving route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    /// Flattened polyline, origin first.
    pub coordinates: Vec<RoutePoint>,
    /// Total distance in kilometers, one decimal.
    pub distance_km: Option<f64>,
    /// Total duration in whole minutes, rounded up.
    pub duration_min: Option<u64>,
    #[serde(default)]
    pub instructions: Vec<RouteInstruction>,
    /// Raw GeoJSON `coordinates` array as returned by the API.
    #[serde(default)]
    pub geometry: serde_json::Value,
}

/// Errors from [`RouteClient::calculate`](super::RouteClient::calculate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    /// HTTP, transport, timeout or parse failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The API answered but returned no route.
    #[error("No route found")]
    NoRoute,

    /// The caller cancelled the calculation.
    #[error("Route calculation cancelled")]
    Cancelled,
}

impl RoutingError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RoutingError::Provider(ProviderError::MissingApiKey)
            | RoutingError::Provider(ProviderError::ClientBuild(_)) => false,
            RoutingError::Provider(_) => true,
            RoutingError::NoRoute | RoutingError::Cancelled => false,
        }
    }
}
