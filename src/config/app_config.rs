use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    HttpClientConfig, RhaiConfig, ServerConfig, deserialize_duration_from_ms,
    deserialize_duration_from_seconds,
};
use crate::models::Settings;

fn default_database_url() -> String {
    "sqlite:vigil.db".to_string()
}

/// Provides the default value for polling_interval_ms.
fn default_polling_interval() -> Duration {
    Duration::from_millis(10)
}

/// Provides the default value for error_backoff_ms.
fn default_error_backoff() -> Duration {
    Duration::from_millis(1000)
}

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_alert_channel_capacity() -> usize {
    256
}

fn default_control_queue_capacity() -> usize {
    64
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Where detections are read from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    /// JSON-lines file the recognition pipeline appends detections to.
    #[serde(default = "default_spool_path")]
    pub spool_path: PathBuf,
}

fn default_spool_path() -> PathBuf {
    PathBuf::from("detections.jsonl")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { spool_path: default_spool_path() }
    }
}

/// Number of preview slots per display group. Fixed for the process lifetime.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_slots")]
    pub car_plate_slots: usize,
    #[serde(default = "default_slots")]
    pub person_slots: usize,
}

fn default_slots() -> usize {
    3
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { car_plate_slots: default_slots(), person_slots: default_slots() }
    }
}

/// Location and sweep cadence of the image archive.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_directory")]
    pub directory: PathBuf,

    /// How often archived images past their retention are deleted.
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub sweep_interval_secs: Duration,
}

fn default_archive_directory() -> PathBuf {
    PathBuf::from("archive")
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(600)
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self { directory: default_archive_directory(), sweep_interval_secs: default_sweep_interval() }
    }
}

/// Controls the `add_function` command.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FunctionsConfig {
    /// When false, every function definition is refused.
    #[serde(default = "default_functions_enabled")]
    pub enabled: bool,
}

fn default_functions_enabled() -> bool {
    true
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self { enabled: default_functions_enabled() }
    }
}

/// Application configuration for Vigil.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite update journal.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// The interval in milliseconds between two refresh cycles.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        default = "default_polling_interval"
    )]
    pub polling_interval_ms: Duration,

    /// The interval used after a failed refresh cycle.
    #[serde(deserialize_with = "deserialize_duration_from_ms", default = "default_error_backoff")]
    pub error_backoff_ms: Duration,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// Capacity of the channel carrying alerts to the dispatcher.
    #[serde(default = "default_alert_channel_capacity")]
    pub alert_channel_capacity: usize,

    /// Capacity of the queue carrying control requests to the detection cycle.
    #[serde(default = "default_control_queue_capacity")]
    pub control_queue_capacity: usize,

    /// Recognition source configuration.
    #[serde(default)]
    pub source: SourceConfig,

    /// Display slot configuration.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Remote command server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Image archive configuration.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Rhai engine limits for installed functions.
    #[serde(default)]
    pub rhai: RhaiConfig,

    /// Function registry configuration.
    #[serde(default)]
    pub functions: FunctionsConfig,

    /// HTTP client used for Telegram.
    #[serde(default)]
    pub http_client: HttpClientConfig,

    /// Base URL of the Telegram Bot API.
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Initial live settings.
    #[serde(default)]
    pub settings: Settings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            polling_interval_ms: default_polling_interval(),
            error_backoff_ms: default_error_backoff(),
            shutdown_timeout: default_shutdown_timeout(),
            alert_channel_capacity: default_alert_channel_capacity(),
            control_queue_capacity: default_control_queue_capacity(),
            source: SourceConfig::default(),
            display: DisplayConfig::default(),
            server: ServerConfig::default(),
            archive: ArchiveConfig::default(),
            rhai: RhaiConfig::default(),
            functions: FunctionsConfig::default(),
            http_client: HttpClientConfig::default(),
            telegram_api_url: default_telegram_api_url(),
            settings: Settings::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.alert_channel_capacity == 0 || self.control_queue_capacity == 0 {
            return Err(ConfigError::Message("Queue capacities must be at least 1".into()));
        }
        if self.archive.sweep_interval_secs.is_zero() {
            return Err(ConfigError::Message("archive.sweep_interval_secs must be positive".into()));
        }
        self.settings.validate().map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn polling_interval(mut self, interval_ms: u64) -> Self {
        self.config.polling_interval_ms = Duration::from_millis(interval_ms);
        self
    }

    pub fn spool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source.spool_path = path.into();
        self
    }

    pub fn archive_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archive.directory = path.into();
        self
    }

    pub fn listen_address(mut self, address: &str) -> Self {
        self.config.server.listen_address = address.to_string();
        self
    }

    pub fn server_enabled(mut self, enabled: bool) -> Self {
        self.config.server.enabled = enabled;
        self
    }

    pub fn telegram_api_url(mut self, url: &str) -> Self {
        self.config.telegram_api_url = url.to_string();
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.config.settings = settings;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
