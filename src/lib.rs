//! Event Gallery: data-access core for a campus event site
//!
//! Classifies events as upcoming or past from a calendar date and a
//! free-text start time, shares identical in-flight requests, and loads
//! gallery previews for event lists in small paced batches.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod metrics;

pub use cache::{Deduplicator, FetchResult, RequestKey};
pub use config::{ApiConfig, Config, LoaderConfig, LoggingConfig};
pub use error::{ConfigError, FetchError, GalleryError, Result};
pub use events::{
    event_instant, event_phase, is_past, is_upcoming, parse_clock, parse_event_date,
    split_by_time, Clock, Event, EventClassifier, EventPhase, EventStatus, EventTiming,
    FixedClock, GalleryImage, ImageUpload, SystemClock,
};
pub use gallery::{
    GalleryApi, GalleryBatchLoader, GalleryClient, HttpGalleryApi, InMemoryGalleryApi, LoadReport,
};
pub use metrics::{get_metrics, Metrics, MetricsSnapshot};
