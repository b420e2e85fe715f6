//! HTTP client factory shared by every uplift crate.
//!
//! All clients include the updater User-Agent, tcp_nodelay and bounded
//! timeouts. A timed-out request surfaces as an ordinary transport error.

use reqwest::Client;
use std::time::Duration;

/// Descriptive client identifier sent with every outbound request
pub const USER_AGENT: &str = concat!("uplift-updater/", env!("CARGO_PKG_VERSION"));

/// Default timeout for metadata requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout; the hosting API is either reachable quickly or not at all
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle pooled connections are dropped after this so DNS is re-resolved.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with default configuration (30s timeout).
pub fn create_default_client() -> Result<Client, String> {
    create_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Creates an HTTP client with a custom overall timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client, String> {
    create_client_builder()
        .timeout(timeout)
        .read_timeout(timeout.min(DEFAULT_TIMEOUT))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}

/// Creates an HTTP client builder with standard configuration.
///
/// Use this when the client needs further customization before building.
///
/// # Example
/// ```ignore
/// let client = create_client_builder()
///     .redirect(reqwest::redirect::Policy::limited(5))
///     .build()
///     .expect("HTTP client");
/// ```
pub fn create_client_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(DEFAULT_TIMEOUT)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_client_succeeds() {
        let result = create_default_client();
        assert!(result.is_ok(), "create_default_client should succeed");
    }

    #[test]
    fn test_create_client_with_short_timeout() {
        let result = create_client_with_timeout(Duration::from_millis(250));
        assert!(result.is_ok());
    }

    #[test]
    fn test_user_agent_identifies_updater() {
        assert!(USER_AGENT.starts_with("uplift-updater/"));
    }
}
