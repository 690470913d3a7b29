//! Configuration settings for the event gallery core.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("event-gallery.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("event-gallery/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url".to_string()).into());
        }

        if self.loader.batch_size == 0 {
            return Err(ConfigError::Invalid("loader.batch_size must be > 0".to_string()).into());
        }

        if self.loader.preview_limit == 0 {
            return Err(
                ConfigError::Invalid("loader.preview_limit must be > 0".to_string()).into(),
            );
        }

        Ok(())
    }
}

/// Gallery API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the site's REST API (e.g. "http://localhost:5000/api")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Bearer token (loaded from EVENT_GALLERY_API_TOKEN if not set)
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            token: None,
        }
    }
}

/// Gallery preview loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of galleries fetched concurrently per batch
    pub batch_size: usize,
    /// Pause between consecutive batches, in milliseconds
    pub batch_delay_ms: u64,
    /// Images kept per event in the preview map
    pub preview_limit: usize,
    /// Default cap on events considered per load call
    pub max_events: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay_ms: 100,
            preview_limit: 3,
            max_events: 12,
        }
    }
}

impl LoaderConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the delay between batches.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set how many images are kept per event.
    pub fn with_preview_limit(mut self, preview_limit: usize) -> Self {
        self.preview_limit = preview_limit;
        self
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Logging settings for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Emit JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
