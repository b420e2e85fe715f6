//! HTTP transport seam.
//!
//! The fetcher only ever issues GET requests through [`HttpTransport`], so the
//! host can substitute its own client. [`ReqwestTransport`] is the default.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

/// One outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Header name to value; names are sent as given
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Response as seen by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Lower-cased header name to value
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header lookup by lower-cased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Network-level failure, including timeouts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// Executes GET requests for the fetcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the standard client configuration.
    pub fn new() -> Self {
        let client = uplift_common::create_default_client().unwrap_or_else(|e| {
            tracing::warn!("{}, falling back to a bare client", e);
            Client::new()
        });
        Self { client }
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::new(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let mut response = HttpResponse {
            status: 204,
            ..Default::default()
        };
        response
            .headers
            .insert("x-ratelimit-remaining".into(), "42".into());
        assert!(response.is_success());
        assert_eq!(response.header("x-ratelimit-remaining"), Some("42"));
        assert_eq!(response.header("missing"), None);

        response.status = 404;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_reqwest_transport_roundtrip() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/repos/acme/widget"))
            .and(wiremock::matchers::header("x-probe", "1"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("X-RateLimit-Remaining", "59")
                    .set_body_string(r#"{"name":"widget"}"#),
            )
            .mount(&server)
            .await;

        let request = HttpRequest {
            url: format!("{}/repos/acme/widget", server.uri()),
            headers: BTreeMap::from([("x-probe".to_string(), "1".to_string())]),
            timeout: Duration::from_secs(5),
        };
        let response = ReqwestTransport::new().get(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.header("x-ratelimit-remaining"), Some("59"));
        assert_eq!(response.body, r#"{"name":"widget"}"#);
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        let request = HttpRequest {
            url: "http://127.0.0.1:9/unreachable".to_string(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(2),
        };
        let result = ReqwestTransport::new().get(request).await;
        assert!(result.is_err());
    }
}
