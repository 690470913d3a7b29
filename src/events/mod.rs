//! Event model and temporal classification.
//!
//! - **Types**: [`Event`], [`GalleryImage`] and [`EventStatus`] mirror the
//!   documents kept by the persistence layer.
//! - **Schedule**: the single implementation of "upcoming or past", driven by
//!   an explicit `now` or an injected [`Clock`].
//!
//! # Usage
//!
//! ```ignore
//! use event_gallery::events::{Event, EventClassifier, EventPhase, SystemClock};
//! use chrono::NaiveDate;
//!
//! let event = Event::new("spring-fest", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
//!     .with_time("2:30 PM");
//!
//! let classifier = EventClassifier::new(SystemClock);
//! if classifier.phase(&event) == EventPhase::Past {
//!     // eligible for a gallery preview
//! }
//! ```

pub mod schedule;
pub mod types;

pub use schedule::{
    event_instant, event_phase, is_past, is_upcoming, parse_clock, split_by_time, Clock,
    EventClassifier, EventPhase, EventTiming, FixedClock, SystemClock,
};
pub use types::{parse_event_date, Event, EventStatus, GalleryImage, ImageUpload};
