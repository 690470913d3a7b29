//! Error types for the event gallery core.

use thiserror::Error;

/// Main error type for event gallery operations.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Failure of a gallery API call.
///
/// Cloneable so that every caller joined to the same in-flight request
/// receives the same error value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Whether a later attempt at the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::RateLimited | FetchError::Transport(_) | FetchError::Aborted(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::NotFound(_) | FetchError::Decode(_) => false,
        }
    }
}

/// Result type alias for event gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;
