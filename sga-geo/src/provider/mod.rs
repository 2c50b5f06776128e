//! Reverse-geocoding provider abstraction
//!
//! This module provides the traits and implementations used to turn a
//! coordinate into an address: Geoapify as the primary provider, Nominatim
//! as the keyless fallback, and a [`ProviderChain`] that tries them in order.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sga_geo::provider::{GeoapifyProvider, NominatimProvider, ProviderChain, ReqwestClient};
//!
//! let http = ReqwestClient::new()?;
//! let chain = ProviderChain::new()
//!     .with_provider(Arc::new(GeoapifyProvider::new(http.clone(), Some(key))))
//!     .with_provider(Arc::new(NominatimProvider::new(http, "MyApp/1.0")));
//! ```

mod address;
mod chain;
mod geoapify;
mod http;
mod nominatim;
mod types;

pub use address::{AddressParts, POI_KEYWORDS, REGIONAL_STATE_VALUES};
pub use chain::{ChainOutcome, ProviderChain};
pub use geoapify::{GeoapifyProvider, DEFAULT_GEOAPIFY_TIMEOUT, GEOAPIFY_REVERSE_URL};
pub use http::{AsyncHttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use nominatim::{
    NominatimProvider, DEFAULT_NOMINATIM_TIMEOUT, DEFAULT_USER_AGENT, NOMINATIM_REVERSE_URL,
};
pub use types::{GeocodeProvider, ProviderError};

#[cfg(test)]
pub use chain::tests::StubProvider;
#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, ScriptedHttpClient};
