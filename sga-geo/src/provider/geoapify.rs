//! Geoapify reverse-geocoding provider.
//!
//! Primary provider. Requires an API key; without one every call fails
//! immediately so the chain can move on.
//!
//! # Endpoint
//!
//! `GET https://api.geoapify.com/v1/geocode/reverse?lat={lat}&lon={lon}&apiKey={key}&lang=pt`
//!
//! The response is a GeoJSON feature collection ranked by distance. We look
//! at the first few features and promote a point of interest (hospital,
//! school, ...) over the nearest bare street match.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::address::{
    first_present, is_regional_state, name_has_poi_keyword, tag_present, tag_text, AddressParts,
};
use super::http::{AsyncHttpClient, HttpRequest};
use super::types::{GeocodeProvider, ProviderError};
use crate::coord::Coordinate;
use crate::BoxFuture;

/// Reverse-geocoding endpoint.
pub const GEOAPIFY_REVERSE_URL: &str = "https://api.geoapify.com/v1/geocode/reverse";

/// Default per-call deadline.
pub const DEFAULT_GEOAPIFY_TIMEOUT: Duration = Duration::from_secs(3);

/// Number of ranked features inspected for a point of interest.
const POI_CANDIDATES: usize = 5;

/// Maximum number of address fragments returned.
const MAX_PARTS: usize = 5;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    name: Option<String>,
    street: Option<String>,
    suburb: Option<String>,
    district: Option<String>,
    neighbourhood: Option<String>,
    quarter: Option<String>,
    city_district: Option<String>,
    city: Option<String>,
    state: Option<String>,
    state_code: Option<String>,
    amenity: Option<Value>,
    building: Option<Value>,
}

impl FeatureProperties {
    fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    fn street(&self) -> Option<&str> {
        self.street.as_deref().filter(|s| !s.is_empty())
    }

    /// Name worth showing: present and not just a repeat of the street.
    fn distinct_name(&self) -> Option<&str> {
        self.name().filter(|name| Some(*name) != self.street())
    }

    fn is_poi(&self) -> bool {
        let named_building = tag_text(&self.building).is_some_and(|b| b != "yes")
            || (tag_present(&self.building) && tag_text(&self.building).is_none());
        tag_present(&self.amenity)
            || named_building
            || self.name().is_some_and(name_has_poi_keyword)
    }

    fn neighbourhood(&self) -> Option<&str> {
        first_present(&[
            &self.suburb,
            &self.district,
            &self.neighbourhood,
            &self.quarter,
            &self.city_district,
        ])
    }

    fn state(&self) -> Option<&str> {
        first_present(&[&self.state_code, &self.state]).filter(|s| !is_regional_state(s))
    }
}

/// Picks the feature to describe.
///
/// The first of the top candidates that is a point of interest with a name
/// distinct from its street wins; otherwise the nearest feature.
fn select_feature(features: &[Feature]) -> Option<&FeatureProperties> {
    features
        .iter()
        .take(POI_CANDIDATES)
        .map(|f| &f.properties)
        .find(|p| p.distinct_name().is_some() && p.is_poi())
        .or_else(|| features.first().map(|f| &f.properties))
}

fn assemble(props: &FeatureProperties) -> Option<String> {
    let mut parts = AddressParts::new();
    parts
        .push(props.distinct_name())
        .push(props.street())
        .push(props.neighbourhood())
        .push(props.city.as_deref())
        .push(props.state());
    parts.build(MAX_PARTS)
}

/// Parses a Geoapify reverse response body into an address.
pub(crate) fn parse_reverse(body: &[u8]) -> Result<String, ProviderError> {
    let response: ReverseResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let props = select_feature(&response.features).ok_or(ProviderError::NoResults)?;
    assemble(props).ok_or(ProviderError::NoResults)
}

/// Geoapify reverse-geocoding provider.
pub struct GeoapifyProvider<C: AsyncHttpClient> {
    http_client: C,
    api_key: Option<String>,
    language: String,
    timeout: Duration,
}

impl<C: AsyncHttpClient> GeoapifyProvider<C> {
    /// Creates a provider with the default language (`pt`) and 3s timeout.
    ///
    /// An empty or missing key is accepted; calls then fail with
    /// [`ProviderError::MissingApiKey`].
    pub fn new(http_client: C, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            language: "pt".to_string(),
            timeout: DEFAULT_GEOAPIFY_TIMEOUT,
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `lang` hint sent to the API.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn build_request(&self, coordinate: Coordinate, api_key: &str) -> Result<HttpRequest, ProviderError> {
        HttpRequest::get(
            GEOAPIFY_REVERSE_URL,
            &[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("apiKey", api_key.to_string()),
                ("lang", self.language.clone()),
            ],
        )
    }

    async fn lookup(&self, coordinate: Coordinate) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let request = self.build_request(coordinate, api_key)?;
        let response = self.http_client.get(&request).await?.error_for_status()?;
        let address = parse_reverse(&response.body)?;
        debug!(%coordinate, address = %address, "Geoapify resolved");
        Ok(address)
    }
}

impl<C: AsyncHttpClient> GeocodeProvider for GeoapifyProvider<C> {
    fn name(&self) -> &str {
        "Geoapify"
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

    fn provider_with(body: Value) -> GeoapifyProvider<MockAsyncHttpClient> {
        let client = MockAsyncHttpClient {
            response: Ok(HttpResponse::ok_json(&body.to_string())),
        };
        GeoapifyProvider::new(client, Some("test_key".to_string()))
    }

    fn street(name: &str) -> Value {
        json!({"properties": {"name": name, "street": name, "city": "São Carlos"}})
    }

    #[tokio::test]
    async fn test_end_to_end_santa_casa() {
        let provider = provider_with(json!({
            "features": [{"properties": {
                "name": "Santa Casa",
                "street": "Rua Paulino Botelho",
                "city": "São Carlos",
                "state": "São Paulo",
                "amenity": "hospital"
            }}]
        }));

        let address = provider
            .reverse(Coordinate::new(-22.0175, -47.8908))
            .await
            .unwrap();
        assert_eq!(
            address,
            "Santa Casa, Rua Paulino Botelho, São Carlos, São Paulo"
        );
    }

    #[tokio::test]
    async fn test_poi_candidate_promoted_over_street_matches() {
        let provider = provider_with(json!({
            "features": [
                street("Rua Episcopal"),
                street("Avenida São Carlos"),
                {"properties": {
                    "name": "Hospital Municipal",
                    "street": "Rua Sete de Setembro",
                    "city": "São Carlos",
                    "amenity": "hospital"
                }},
                street("Rua Dona Alexandrina"),
                street("Rua Conde do Pinhal")
            ]
        }));

        let address = provider.reverse(Coordinate::new(-22.0, -47.9)).await.unwrap();
        assert!(address.contains("Hospital Municipal"));
        assert!(!address.contains("Rua Episcopal"));
    }

    #[tokio::test]
    async fn test_poi_beyond_fifth_candidate_is_ignored() {
        let mut features: Vec<Value> = (0..5).map(|i| street(&format!("Rua {}", i))).collect();
        features.push(json!({"properties": {"name": "Hospital Distante", "amenity": "hospital"}}));
        let provider = provider_with(json!({ "features": features }));

        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Rua 0, São Carlos");
    }

    #[tokio::test]
    async fn test_keyword_and_building_rules() {
        let provider = provider_with(json!({
            "features": [
                {"properties": {"name": "Casa Amarela", "street": "Rua X", "building": "yes"}},
                {"properties": {"name": "Escola Estadual Álvaro Guião", "street": "Rua Y"}}
            ]
        }));
        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Escola Estadual Álvaro Guião, Rua Y");

        let provider = provider_with(json!({
            "features": [
                {"properties": {"name": "Edifício Central Park", "street": "Rua Z", "building": "apartments"}}
            ]
        }));
        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Edifício Central Park, Rua Z");
    }

    #[tokio::test]
    async fn test_regional_state_is_dropped_and_state_code_preferred() {
        let provider = provider_with(json!({
            "features": [{"properties": {
                "street": "Rua A", "suburb": "Centro", "city": "Araraquara", "state": "Sudeste"
            }}]
        }));
        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Rua A, Centro, Araraquara");

        let provider = provider_with(json!({
            "features": [{"properties": {
                "street": "Rua A", "city": "Araraquara", "state": "São Paulo", "state_code": "SP"
            }}]
        }));
        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Rua A, Araraquara, SP");
    }

    #[tokio::test]
    async fn test_duplicate_parts_collapse() {
        let provider = provider_with(json!({
            "features": [{"properties": {
                "street": "Rua A", "suburb": "rua a", "city": "Centro", "district": "x"
            }}]
        }));
        let address = provider.reverse(Coordinate::new(0.0, 0.0)).await.unwrap();
        assert_eq!(address, "Rua A, Centro");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("{}"))]);
        let provider = GeoapifyProvider::new(client, Some("  ".to_string()));

        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert_eq!(result, Err(ProviderError::MissingApiKey));
        assert_eq!(provider.http_client.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let client = MockAsyncHttpClient {
            response: Ok(HttpResponse::new(429, "")),
        };
        let provider = GeoapifyProvider::new(client, Some("k".to_string()));
        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert_eq!(result, Err(ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn test_empty_and_malformed_bodies() {
        let provider = provider_with(json!({"features": []}));
        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert_eq!(result, Err(ProviderError::NoResults));

        let provider = provider_with(json!({"features": [{"properties": {}}]}));
        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert_eq!(result, Err(ProviderError::NoResults));

        let client = MockAsyncHttpClient {
            response: Ok(HttpResponse::ok_json("<html>")),
        };
        let provider = GeoapifyProvider::new(client, Some("k".to_string()));
        let result = provider.reverse(Coordinate::new(0.0, 0.0)).await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_request_parameters() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            &json!({"features": [street("Rua A")]}).to_string(),
        ))]);
        let provider = GeoapifyProvider::new(client, Some("secret".to_string()));
        provider.reverse(Coordinate::new(-22.5, -47.25)).await.unwrap();

        let request = provider.http_client.last_request().unwrap();
        assert!(request.url.starts_with(GEOAPIFY_REVERSE_URL));
        assert!(request.url.contains("lat=-22.5"));
        assert!(request.url.contains("lon=-47.25"));
        assert!(request.url.contains("apiKey=secret"));
        assert!(request.url.contains("lang=pt"));
    }

    #[test]
    fn test_name_and_timeout() {
        let provider = provider_with(json!({}));
        assert_eq!(provider.name(), "Geoapify");
        assert_eq!(provider.timeout(), Duration::from_secs(3));
        let provider = provider.with_timeout(Duration::from_millis(500));
        assert_eq!(provider.timeout(), Duration::from_millis(500));
    }
}
