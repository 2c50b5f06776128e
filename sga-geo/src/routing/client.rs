//! Geoapify routing client with a route cache in front.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::instructions::localize;
use super::types::{RouteInstruction, RoutePoint, RouteResult, RoutingError};
use crate::cache::RouteCacheService;
use crate::coord::Coordinate;
use crate::provider::{AsyncHttpClient, HttpRequest, ProviderError};

/// Geoapify routing endpoint.
pub const GEOAPIFY_ROUTING_URL: &str = "https://api.geoapify.com/v1/routing";

/// Default per-attempt deadline.
pub const DEFAULT_ROUTING_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Backoff before retry `n` is `base * 2^n`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

// Response shape. Only the fields we read are modeled.

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    #[serde(default)]
    features: Vec<RouteFeature>,
}

#[derive(Debug, Deserialize)]
struct RouteFeature {
    geometry: Geometry,
    #[serde(default)]
    properties: RouteProperties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

#[derive(Debug, Default, Deserialize)]
struct RouteProperties {
    distance: Option<f64>,
    time: Option<f64>,
    #[serde(default)]
    legs: Vec<RouteLeg>,
}

#[derive(Debug, Default, Deserialize)]
struct RouteLeg {
    #[serde(default)]
    steps: Vec<RouteStep>,
}

#[derive(Debug, Deserialize)]
struct RouteStep {
    distance: Option<f64>,
    duration: Option<f64>,
    instruction: Option<StepInstruction>,
}

#[derive(Debug, Deserialize)]
struct StepInstruction {
    text: Option<String>,
}

/// Parses a routing API body into a [`RouteResult`].
pub(crate) fn parse_route(body: &[u8]) -> Result<RouteResult, RoutingError> {
    let response: RoutingResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or(RoutingError::NoRoute)?;

    let coordinates = flatten_geometry(&feature.geometry)?;
    let props = feature.properties;

    let distance_km = props
        .distance
        .filter(|m| *m > 0.0)
        .map(|m| (m / 1000.0 * 10.0).round() / 10.0);
    let duration_min = props
        .time
        .filter(|s| *s > 0.0)
        .map(|s| (s / 60.0).ceil() as u64);

    let instructions = props
        .legs
        .into_iter()
        .next()
        .map(|leg| {
            leg.steps
                .into_iter()
                .map(|step| {
                    let text = step
                        .instruction
                        .and_then(|i| i.text)
                        .unwrap_or_default();
                    RouteInstruction {
                        instruction: localize(&text),
                        distance: step.distance,
                        duration: step.duration,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RouteResult {
        coordinates,
        distance_km,
        duration_min,
        instructions,
        geometry: feature.geometry.coordinates,
    })
}

/// Maps GeoJSON `[lon, lat]` positions to points, flattening multi-lines.
fn flatten_geometry(geometry: &Geometry) -> Result<Vec<RoutePoint>, RoutingError> {
    let lines: Vec<Vec<Vec<f64>>> = match geometry.kind.as_str() {
        "LineString" => vec![decode(&geometry.coordinates)?],
        "MultiLineString" => decode(&geometry.coordinates)?,
        _ => Vec::new(),
    };

    Ok(lines
        .into_iter()
        .flatten()
        .filter(|position| position.len() >= 2)
        .map(|position| RoutePoint {
            latitude: position[1],
            longitude: position[0],
        })
        .collect())
}

fn decode<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, RoutingError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::Malformed(format!("geometry: {}", e)).into())
}

/// Driving-route client.
///
/// Checks the route cache first, then calls the routing API with a per-attempt
/// timeout and exponential backoff between retries.
pub struct RouteClient<C: AsyncHttpClient> {
    http: C,
    api_key: Option<String>,
    cache: Option<Arc<RouteCacheService>>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    language: String,
}

impl<C: AsyncHttpClient> RouteClient<C> {
    pub fn new(http: C, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            cache: None,
            timeout: DEFAULT_ROUTING_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            language: "pt".to_string(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<RouteCacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, base: Duration) -> Self {
        self.retry_base_delay = base;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Calculates a driving route from `origin` to `destination`.
    pub async fn calculate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        cancellation: &CancellationToken,
    ) -> Result<RouteResult, RoutingError> {
        if let Some(cache) = &self.cache {
            if let Some(route) = cache.get_route(origin, destination).await {
                debug!(%origin, %destination, "Route cache hit");
                return Ok(route);
            }
        }

        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(RoutingError::Cancelled),
                result = self.fetch(origin, destination) => result,
            };

            match result {
                Ok(route) => {
                    if let Some(cache) = &self.cache {
                        cache.save_route(origin, destination, &route).await;
                    }
                    return Ok(route);
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        %origin,
                        %destination,
                        error = %error,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Route calculation failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => return Err(RoutingError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        %origin,
                        %destination,
                        error = %error,
                        attempt = attempt + 1,
                        "Route calculation failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    async fn fetch(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteResult, RoutingError> {
        let api_key = self.api_key.clone().ok_or(ProviderError::MissingApiKey)?;
        let request = HttpRequest::get(
            GEOAPIFY_ROUTING_URL,
            &[
                (
                    "waypoints",
                    format!("{}|{}", origin.waypoint(), destination.waypoint()),
                ),
                ("mode", "drive".to_string()),
                ("apiKey", api_key),
                ("details", "instruction_details".to_string()),
                ("lang", self.language.clone()),
            ],
        )?;

        let response = tokio::time::timeout(self.timeout, self.http.get(&request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??
            .error_for_status()?;

        parse_route(&response.body)
    }
}
