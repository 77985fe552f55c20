//! Configuration loading for Vigil.

mod app_config;
mod helpers;
mod http;
mod rhai;
mod server;

#[cfg(test)]
pub use app_config::AppConfigBuilder;
pub use app_config::{AppConfig, ArchiveConfig, DisplayConfig, FunctionsConfig, SourceConfig};
pub use helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds};
pub use http::HttpClientConfig;
pub use rhai::RhaiConfig;
pub use server::ServerConfig;
