//! Configuration loading.

mod settings;

pub use settings::{ApiConfig, Config, LoaderConfig, LoggingConfig};
