use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

/// Settings for the HTTP client the Telegram messenger sends with.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Time allowed to open a connection.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub connect_timeout: Duration,

    /// Time allowed for a whole request, photo upload included.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub request_timeout: Duration,

    /// How long an unused pooled connection is kept open.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub idle_timeout: Duration,

    pub max_idle_per_host: usize,

    /// Sent as the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            max_idle_per_host: 4,
            user_agent: concat!("vigil/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
