//! Event and gallery types shared across the gallery layer.
//!
//! The shapes follow the site's JSON documents: camelCase field names, with
//! the persistence layer's `_id` accepted as an alias for `id`.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::schedule::{self, EventPhase, EventTiming};

// ============================================================================
// Event
// ============================================================================

/// Author-set publication status of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    #[default]
    Published,
    Cancelled,
    Completed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "cancelled" | "canceled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

/// A college event as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable unique identifier.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Calendar date of the event, without time zone.
    #[serde(deserialize_with = "deserialize_event_date")]
    pub date: NaiveDate,
    /// Free-text start time ("2:30 PM" or "14:30"); absent means start of day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Author-set status.
    #[serde(default)]
    pub status: EventStatus,
    /// Photos attached to the event.
    #[serde(default)]
    pub gallery_images: Vec<GalleryImage>,
}

impl Event {
    /// Create a published event on the given date with no start time.
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            title: None,
            date,
            time: None,
            status: EventStatus::Published,
            gallery_images: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the free-text start time.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Set the author status.
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// The instant this event starts, in local wall-clock time.
    pub fn instant(&self) -> NaiveDateTime {
        schedule::event_instant(self.date, self.time.as_deref())
    }

    /// Phase of this event relative to `now`.
    pub fn phase(&self, now: NaiveDateTime) -> EventPhase {
        schedule::event_phase(self.date, self.time.as_deref(), self.status, now)
    }

    /// Whether the event starts strictly after `now`.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        schedule::is_upcoming(self.instant(), now)
    }

    /// Whether the event started at or before `now`.
    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        schedule::is_past(self.instant(), now)
    }

    /// Timing annotation for API responses.
    pub fn timing(&self, now: NaiveDateTime) -> EventTiming {
        EventTiming::for_event(self, now)
    }

    /// Whether the event may carry a gallery: it is past and not cancelled.
    pub fn is_gallery_eligible(&self, now: NaiveDateTime) -> bool {
        self.phase(now) == EventPhase::Past
    }
}

/// Accepts both plain dates ("2024-03-15") and ISO datetimes
/// ("2024-03-15T00:00:00.000Z"), keeping only the calendar date.
fn deserialize_event_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

/// Parse the date column the way the site stores it.
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    // "YYYY-MM-DDTHH:MM:SS" without offset
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

// ============================================================================
// Gallery
// ============================================================================

/// A photo hosted by the external image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    /// Identifier assigned by the image store at upload time.
    #[serde(alias = "id")]
    pub public_id: String,
    /// Full-resolution asset location.
    pub url: String,
    /// Optional caption, editable independently of the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Set once when the image is created.
    pub uploaded_at: DateTime<Utc>,
}

impl GalleryImage {
    pub fn new(public_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            url: url.into(),
            caption: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// URL of a width-limited rendition.
    ///
    /// Image-host URLs containing an `/upload/` segment get a transformation
    /// inserted after it; other URLs are returned unchanged.
    pub fn thumbnail_url(&self, width: u32) -> String {
        match self.url.split_once("/upload/") {
            Some((head, tail)) => format!("{}/upload/w_{},c_limit/{}", head, width, tail),
            None => self.url.clone(),
        }
    }
}

/// Payload for adding an image to an event gallery.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    pub caption: Option<String>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}
