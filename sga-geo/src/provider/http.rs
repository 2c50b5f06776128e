//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use reqwest::Url;

use super::types::ProviderError;

/// Default overall timeout for the shared reqwest client.
///
/// Per-provider deadlines are tighter and enforced by the caller.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// A GET request: fully encoded URL plus extra headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Builds a GET request with percent-encoded query parameters.
    pub fn get(base: &str, params: &[(&str, String)]) -> Result<Self, ProviderError> {
        let url = Url::parse_with_params(base, params)
            .map_err(|e| ProviderError::Network(format!("Invalid URL {}: {}", base, e)))?;
        Ok(Self {
            url: url.to_string(),
            headers: Vec::new(),
        })
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status code and body of a completed request.
///
/// Non-success statuses are returned as values; providers decide what they mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response with the given JSON text.
    pub fn ok_json(body: &str) -> Self {
        Self::new(200, body.as_bytes().to_vec())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails with the status-mapped error unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self, ProviderError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProviderError::from_status(self.status))
        }
    }
}

/// Trait for async HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// Transport failures are errors; any received status is a response.
    fn get(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;
}

/// Real HTTP client implementation using reqwest.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_CLIENT_TIMEOUT)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, ProviderError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock HTTP client returning the same response for every request.
    pub struct MockAsyncHttpClient {
        pub response: Result<HttpResponse, ProviderError>,
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, _request: &HttpRequest) -> Result<HttpResponse, ProviderError> {
            self.response.clone()
        }
    }

    /// Mock HTTP client replaying a script of responses and recording requests.
    ///
    /// Once the script runs out the last response is repeated.
    #[derive(Default)]
    pub struct ScriptedHttpClient {
        script: Mutex<VecDeque<Result<HttpResponse, ProviderError>>>,
        last: Mutex<Option<Result<HttpResponse, ProviderError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedHttpClient {
        pub fn new(script: Vec<Result<HttpResponse, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<HttpRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    impl AsyncHttpClient for ScriptedHttpClient {
        async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(response) => {
                    *last = Some(response.clone());
                    response
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into()))),
            }
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockAsyncHttpClient {
            response: Ok(HttpResponse::ok_json("{}")),
        };

        let request = HttpRequest::get("http://example.com", &[]).unwrap();
        let result = mock.get(&request).await;
        assert_eq!(result.unwrap().body, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_scripted_client_replays_then_repeats() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::ok_json("[]")),
        ]);
        let request = HttpRequest::get("http://example.com", &[]).unwrap();

        assert_eq!(client.get(&request).await.unwrap().status, 429);
        assert_eq!(client.get(&request).await.unwrap().status, 200);
        assert_eq!(client.get(&request).await.unwrap().status, 200);
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn test_request_encodes_params() {
        let request = HttpRequest::get(
            "https://api.example.com/reverse",
            &[("lat", "-22.5".to_string()), ("q", "a b|c".to_string())],
        )
        .unwrap();

        assert!(request.url.starts_with("https://api.example.com/reverse?"));
        assert!(request.url.contains("lat=-22.5"));
        assert!(request.url.contains("q=a+b%7Cc"));
    }

    #[test]
    fn test_request_headers() {
        let request = HttpRequest::get("https://example.com", &[])
            .unwrap()
            .with_header("User-Agent", "SGA/1.0");
        assert_eq!(request.header("user-agent"), Some("SGA/1.0"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_error_for_status() {
        assert!(HttpResponse::ok_json("{}").error_for_status().is_ok());
        assert_eq!(
            HttpResponse::new(429, "").error_for_status(),
            Err(ProviderError::RateLimited)
        );
        assert_eq!(
            HttpResponse::new(500, "").error_for_status(),
            Err(ProviderError::HttpStatus(500))
        );
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(Duration::from_secs(1)).is_ok());
    }
}
