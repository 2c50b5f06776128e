//! Ordered provider fallback.
//!
//! Providers are tried in order, each under its own deadline. The first
//! success wins; a failure of any kind (rate limit, HTTP error, timeout,
//! empty or malformed body) moves on to the next provider. A provider is
//! never retried within one resolution.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{GeocodeProvider, ProviderError};
use crate::coord::Coordinate;

/// Result of running a coordinate through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// A provider produced an address.
    Resolved {
        address: String,
        /// Name of the provider that answered.
        provider: String,
        /// Zero-based position of that provider in the chain.
        position: usize,
    },
    /// Every provider failed.
    Exhausted,
    /// The caller cancelled before any provider answered.
    Cancelled,
}

impl ChainOutcome {
    /// True if the answer did not come from the first provider.
    pub fn used_fallback(&self) -> bool {
        match self {
            ChainOutcome::Resolved { position, .. } => *position > 0,
            ChainOutcome::Exhausted => true,
            ChainOutcome::Cancelled => false,
        }
    }
}

/// Ordered list of reverse-geocoding providers.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn GeocodeProvider>>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider at the lowest precedence.
    pub fn with_provider(mut self, provider: Arc<dyn GeocodeProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider names in precedence order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Runs the coordinate through the providers in order.
    pub async fn resolve(
        &self,
        coordinate: Coordinate,
        cancellation: &CancellationToken,
    ) -> ChainOutcome {
        for (position, provider) in self.providers.iter().enumerate() {
            let deadline = provider.timeout();
            let call = tokio::time::timeout(deadline, provider.reverse(coordinate));

            let result = tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    debug!(%coordinate, provider = provider.name(), "Resolution cancelled");
                    return ChainOutcome::Cancelled;
                }

                result = call => result.unwrap_or(Err(ProviderError::Timeout(deadline))),
            };

            match result {
                Ok(address) => {
                    return ChainOutcome::Resolved {
                        address,
                        provider: provider.name().to_string(),
                        position,
                    };
                }
                Err(error) => {
                    let next = self.providers.get(position + 1).map(|p| p.name());
                    warn!(
                        %coordinate,
                        provider = provider.name(),
                        error = %error,
                        kind = error.kind(),
                        next_provider = next.unwrap_or("none"),
                        "Geocoding provider failed"
                    );
                }
            }
        }

        ChainOutcome::Exhausted
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider with a fixed answer, an optional delay, and a call counter.
    pub struct StubProvider {
        pub name: &'static str,
        pub result: Result<String, ProviderError>,
        pub delay: Duration,
        pub timeout: Duration,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub fn ok(name: &'static str, address: &str) -> Self {
            Self {
                name,
                result: Ok(address.to_string()),
                delay: Duration::ZERO,
                timeout: Duration::from_secs(3),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &'static str, error: ProviderError) -> Self {
            Self {
                result: Err(error),
                ..Self::ok(name, "")
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GeocodeProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn reverse(&self, _coordinate: Coordinate) -> BoxFuture<'_, Result<String, ProviderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.result.clone()
            })
        }
    }

    fn coord() -> Coordinate {
        Coordinate::new(-22.0175, -47.8908)
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Arc::new(StubProvider::ok("primary", "Rua A"));
        let secondary = Arc::new(StubProvider::ok("secondary", "Rua B"));
        let chain = ProviderChain::new()
            .with_provider(primary.clone())
            .with_provider(secondary.clone());

        let outcome = chain.resolve(coord(), &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            ChainOutcome::Resolved {
                address: "Rua A".into(),
                provider: "primary".into(),
                position: 0
            }
        );
        assert!(!outcome.used_fallback());
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back_once_without_retrying_primary() {
        let primary = Arc::new(StubProvider::failing("primary", ProviderError::RateLimited));
        let secondary = Arc::new(StubProvider::ok("secondary", "Rua B"));
        let chain = ProviderChain::new()
            .with_provider(primary.clone())
            .with_provider(secondary.clone());

        let outcome = chain.resolve(coord(), &CancellationToken::new()).await;
        assert!(outcome.used_fallback());
        assert!(matches!(outcome, ChainOutcome::Resolved { ref address, .. } if address == "Rua B"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let primary =
            Arc::new(StubProvider::ok("primary", "late").with_delay(Duration::from_secs(10)));
        let secondary = Arc::new(StubProvider::ok("secondary", "Rua B"));
        let chain = ProviderChain::new()
            .with_provider(primary)
            .with_provider(secondary);

        let outcome = chain.resolve(coord(), &CancellationToken::new()).await;
        assert!(matches!(outcome, ChainOutcome::Resolved { position: 1, .. }));
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(StubProvider::failing(
                "primary",
                ProviderError::Network("down".into()),
            )))
            .with_provider(Arc::new(StubProvider::failing(
                "secondary",
                ProviderError::NoResults,
            )));

        let outcome = chain.resolve(coord(), &CancellationToken::new()).await;
        assert_eq!(outcome, ChainOutcome::Exhausted);
        assert!(outcome.used_fallback());
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let chain = ProviderChain::new();
        assert!(chain.is_empty());
        let outcome = chain.resolve(coord(), &CancellationToken::new()).await;
        assert_eq!(outcome, ChainOutcome::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_call() {
        let primary =
            Arc::new(StubProvider::ok("primary", "late").with_delay(Duration::from_secs(2)));
        let secondary = Arc::new(StubProvider::ok("secondary", "Rua B"));
        let chain = ProviderChain::new()
            .with_provider(primary)
            .with_provider(secondary.clone());

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let outcome = chain.resolve(coord(), &token).await;
        assert_eq!(outcome, ChainOutcome::Cancelled);
        assert_eq!(secondary.calls(), 0);
    }

    #[test]
    fn test_names_in_order() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(StubProvider::ok("a", "")))
            .with_provider(Arc::new(StubProvider::ok("b", "")));
        assert_eq!(chain.names(), vec!["a", "b"]);
        assert_eq!(chain.len(), 2);
    }
}
