use thiserror::Error;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// Errors surfaced by [`GeocodeResolver`](super::GeocodeResolver).
///
/// [`resolve`](super::GeocodeResolver::resolve) never returns these; they
/// come from construction, cancellable lookups and explicit maintenance.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The caller cancelled the request.
    #[error("Geocode request cancelled")]
    Cancelled,

    /// The resolver was shut down before the request was answered.
    #[error("Geocode resolver is shut down")]
    ShutDown,

    /// Opening or writing the persisted cache failed.
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] ProviderError),
}
