//! Nominatim (OpenStreetMap) reverse-geocoding provider.
//!
//! Fallback provider. No API key, but the usage policy requires a
//! `User-Agent` that identifies the application.
//!
//! # Endpoint
//!
//! `GET https://nominatim.openstreetmap.org/reverse?lat={lat}&lon={lon}&format=json&accept-language=pt-BR&zoom=18`

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::address::{first_present, AddressParts};
use super::http::{AsyncHttpClient, HttpRequest};
use super::types::{GeocodeProvider, ProviderError};
use crate::coord::Coordinate;
use crate::BoxFuture;

/// Reverse-geocoding endpoint.
pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Default per-call deadline.
pub const DEFAULT_NOMINATIM_TIMEOUT: Duration = Duration::from_secs(5);

/// Default client identification sent with every request.
pub const DEFAULT_USER_AGENT: &str = "SGA-Geo/0.1";

/// Building-level detail.
const ZOOM: u8 = 18;

/// Maximum number of address fragments returned.
const MAX_PARTS: usize = 4;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<OsmAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct OsmAddress {
    amenity: Option<String>,
    building: Option<String>,
    name: Option<String>,
    road: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    district: Option<String>,
    quarter: Option<String>,
    city: Option<String>,
    town: Option<String>,
    municipality: Option<String>,
}

impl OsmAddress {
    fn place_name(&self) -> Option<&str> {
        let road = self.road.as_deref();
        first_present(&[&self.amenity, &self.building, &self.name]).filter(|n| Some(*n) != road)
    }

    fn neighbourhood(&self) -> Option<&str> {
        first_present(&[
            &self.suburb,
            &self.neighbourhood,
            &self.district,
            &self.quarter,
        ])
    }

    fn city(&self) -> Option<&str> {
        first_present(&[&self.city, &self.town, &self.municipality])
    }
}

/// Parses a Nominatim reverse response body into an address.
pub(crate) fn parse_reverse(body: &[u8]) -> Result<String, ProviderError> {
    let response: ReverseResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let address = response.address.unwrap_or_default();

    let mut parts = AddressParts::new();
    parts
        .push(address.place_name())
        .push(address.road.as_deref())
        .push(address.neighbourhood())
        .push(address.city());
    parts.build(MAX_PARTS).ok_or(ProviderError::NoResults)
}

/// Nominatim reverse-geocoding provider.
pub struct NominatimProvider<C: AsyncHttpClient> {
    http_client: C,
    user_agent: String,
    accept_language: String,
    timeout: Duration,
}

impl<C: AsyncHttpClient> NominatimProvider<C> {
    /// Creates a provider with `pt-BR` results and a 5s timeout.
    pub fn new(http_client: C, user_agent: impl Into<String>) -> Self {
        Self {
            http_client,
            user_agent: user_agent.into(),
            accept_language: "pt-BR".to_string(),
            timeout: DEFAULT_NOMINATIM_TIMEOUT,
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `accept-language` parameter.
    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = language.into();
        self
    }

    fn build_request(&self, coordinate: Coordinate) -> Result<HttpRequest, ProviderError> {
        Ok(HttpRequest::get(
            NOMINATIM_REVERSE_URL,
            &[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("format", "json".to_string()),
                ("accept-language", self.accept_language.clone()),
                ("zoom", ZOOM.to_string()),
            ],
        )?
        .with_header("User-Agent", self.user_agent.clone()))
    }

    async fn lookup(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        let request = self.build_request(coordinate)?;
        let response = self.http_client.get(&request).await?.error_for_status()?;
        let address = parse_reverse(&response.body)?;
        debug!(%coordinate, address = %address, "Nominatim resolved");
        Ok(address)
    }
}

impl<C: AsyncHttpClient> GeocodeProvider for NominatimProvider<C> {
    fn name(&self) -> &str {
        "Nominatim"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn reverse(&self, coordinate: Coordinate) -> BoxFuture<'_, Result<String, ProviderError>> {
        Box::pin(self.lookup(coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::http::tests::{MockAsyncHttpClient, ScriptedHttpClient};
    use crate::provider::http::HttpResponse;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<String, ProviderError> {
        parse_reverse(body.to_string().as_bytes())
    }

    #[test]
    fn test_full_address() {
        let address = parse(json!({"address": {
            "amenity": "UPA Vila Prado",
            "road": "Rua Cândido Padim",
            "suburb": "Vila Prado",
            "city": "São Carlos",
            "state": "São Paulo"
        }}))
        .unwrap();
        assert_eq!(
            address,
            "UPA Vila Prado, Rua Cândido Padim, Vila Prado, São Carlos"
        );
    }

    #[test]
    fn test_place_name_equal_to_road_is_skipped() {
        let address = parse(json!({"address": {
            "name": "Rua XV de Novembro",
            "road": "Rua XV de Novembro",
            "town": "Ibaté"
        }}))
        .unwrap();
        assert_eq!(address, "Rua XV de Novembro, Ibaté");
    }

    #[test]
    fn test_municipality_and_neighbourhood_fallbacks() {
        let address = parse(json!({"address": {
            "road": "Estrada Municipal",
            "quarter": "Zona Rural",
            "municipality": "Descalvado"
        }}))
        .unwrap();
        assert_eq!(address, "Estrada Municipal, Zona Rural, Descalvado");
    }

    #[test]
    fn test_caps_at_four_parts() {
        let address = parse(json!({"address": {
            "building": "Bloco B",
            "road": "Rua A",
            "neighbourhood": "Jardim",
            "city": "Cidade",
            "town": "Outra"
        }}))
        .unwrap();
        assert_eq!(address, "Bloco B, Rua A, Jardim, Cidade");
    }

    #[test]
    fn test_missing_address_is_no_results() {
        assert_eq!(parse(json!({"error": "Unable to geocode"})), Err(ProviderError::NoResults));
        assert_eq!(parse(json!({"address": {}})), Err(ProviderError::NoResults));
        assert!(matches!(
            parse_reverse(b"not json"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_request_has_user_agent_and_params() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            &json!({"address": {"road": "Rua A"}}).to_string(),
        ))]);
        let provider = NominatimProvider::new(client, "SGA-Test/1.0");

        let address = provider.reverse(Coordinate::new(-22.0, -47.0)).await.unwrap();
        assert_eq!(address, "Rua A");

        let request = provider.http_client.last_request().unwrap();
        assert!(request.url.starts_with(NOMINATIM_REVERSE_URL));
        assert!(request.url.contains("format=json"));
        assert!(request.url.contains("accept-language=pt-BR"));
        assert!(request.url.contains("zoom=18"));
        assert_eq!(request.header("User-Agent"), Some("SGA-Test/1.0"));
    }

    #[tokio::test]
    async fn test_server_error() {
        let client = MockAsyncHttpClient {
            response: Ok(HttpResponse::new(503, "busy")),
        };
        let provider = NominatimProvider::new(client, DEFAULT_USER_AGENT);
        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert_eq!(result, Err(ProviderError::HttpStatus(503)));
    }

    #[test]
    fn test_name_and_timeout() {
        let client = MockAsyncHttpClient {
            response: Ok(HttpResponse::ok_json("{}")),
        };
        let provider = NominatimProvider::new(client, DEFAULT_USER_AGENT);
        assert_eq!(provider.name(), "Nominatim");
        assert_eq!(provider.timeout(), Duration::from_secs(5));
    }
}
