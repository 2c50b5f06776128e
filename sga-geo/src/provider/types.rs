//! Provider trait and error types.

use std::time::Duration;

use thiserror::Error;

use crate::coord::Coordinate;
use crate::BoxFuture;

/// Errors a provider call can end with.
///
/// None of these reach `GeocodeResolver::resolve` callers; they decide
/// whether the chain moves on to the next provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP 429 from the provider.
    #[error("Rate limited by provider")]
    RateLimited,

    /// Any other non-success status.
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// Connection, DNS, TLS or body read failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The body was not the JSON shape we expected.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// A well-formed response with nothing usable in it.
    #[error("No results in response")]
    NoResults,

    /// Provider requires an API key and none is configured.
    #[error("API key not configured")]
    MissingApiKey,

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl ProviderError {
    /// Short machine-friendly label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "rate_limited",
            ProviderError::HttpStatus(_) => "http_status",
            ProviderError::Network(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Malformed(_) => "malformed",
            ProviderError::NoResults => "no_results",
            ProviderError::MissingApiKey => "missing_api_key",
            ProviderError::ClientBuild(_) => "client_build",
        }
    }

    /// Maps a non-success HTTP status to the matching error.
    pub fn from_status(status: u16) -> Self {
        if status == 429 {
            ProviderError::RateLimited
        } else {
            ProviderError::HttpStatus(status)
        }
    }
}

/// A reverse-geocoding backend.
///
/// Implementations turn a coordinate into a short address string or fail.
/// The trait is dyn-compatible so a [`ProviderChain`](super::ProviderChain)
/// can hold heterogeneous providers.
pub trait GeocodeProvider: Send + Sync {
    /// Human-readable provider name for logs and notices.
    fn name(&self) -> &str;

    /// Deadline applied to each call by the chain.
    fn timeout(&self) -> Duration;

    /// Resolves a coordinate to an address.
    fn reverse(&self, coordinate: Coordinate) -> BoxFuture<'_, Result<String, ProviderError>>;
}
