//! Construction of the shared HTTP client used by the remote messenger.
//!
//! The client carries no retry middleware: every alert gets exactly one
//! delivery attempt.

use reqwest::Client;
use thiserror::Error;

use crate::config::HttpClientConfig;

/// Errors that can occur while building an HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Creates an HTTP client with the configured timeouts and pool limits.
pub fn create_http_client(config: &HttpClientConfig) -> Result<Client, HttpClientError> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(Some(config.idle_timeout))
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_http_client_with_defaults() {
        assert!(create_http_client(&HttpClientConfig::default()).is_ok());
    }
}
