//! Temporal classification of events.
//!
//! Every question of the form "has this event happened yet?" goes through the
//! functions in this module. They are pure: the caller supplies `now`, either
//! directly or through a [`Clock`], so server responses, badges and gallery
//! eligibility all agree on the same instant.
//!
//! Start times are free text. A clock followed by `am`/`pm` is read as a
//! 12-hour clock, anything else as `HH:MM`. Unreadable input degrades to
//! midnight instead of failing.

use std::sync::LazyLock;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{Event, EventStatus};

/// Leading hour, optionally followed by `:MM`.
static CLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?").expect("Invalid regex"));

/// `AM`/`PM` suffix right after the clock, dotted or not.
static MERIDIEM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*([ap])\.?\s*m\b").expect("Invalid regex"));

// ============================================================================
// Clock
// ============================================================================

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// Parse a free-text start time. Never fails; bad input yields 00:00.
///
/// The meridiem is taken from the suffix right after the clock, so trailing
/// text such as `"10:00 AM - 2:00 PM"` does not change the start. Only when
/// that suffix is missing does an `am`/`pm` anywhere in the string count.
pub fn parse_clock(raw: &str) -> NaiveTime {
    let trimmed = raw.trim();

    let Some(caps) = CLOCK_PATTERN.captures(trimmed) else {
        return NaiveTime::MIN;
    };
    let Some(clock) = caps.get(0) else {
        return NaiveTime::MIN;
    };
    let rest = &trimmed[clock.end()..];
    // "123:00" or "14:305" are not clocks.
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return NaiveTime::MIN;
    }

    let Some(hour) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
        return NaiveTime::MIN;
    };
    let minute = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);

    let meridiem = match MERIDIEM_SUFFIX.captures(rest).and_then(|c| c.get(1)) {
        Some(m) if m.as_str().eq_ignore_ascii_case("p") => Some(Meridiem::Pm),
        Some(_) => Some(Meridiem::Am),
        None => {
            let lower = rest.to_ascii_lowercase();
            if lower.contains("pm") {
                Some(Meridiem::Pm)
            } else if lower.contains("am") {
                Some(Meridiem::Am)
            } else {
                None
            }
        }
    };

    let hour = match meridiem {
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Pm) if hour != 12 => hour + 12,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Combine an event date and optional start time into one instant.
pub fn event_instant(date: NaiveDate, time: Option<&str>) -> NaiveDateTime {
    let clock = match time {
        Some(t) if !t.trim().is_empty() => parse_clock(t),
        _ => NaiveTime::MIN,
    };
    date.and_time(clock)
}

// ============================================================================
// Classification
// ============================================================================

/// Derived, time-aware state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPhase {
    /// Starts on a later day.
    Upcoming,
    /// Starts later on the current day.
    Today,
    /// Started at or before now.
    Past,
    /// Cancelled by its author, regardless of time.
    Cancelled,
}

impl std::fmt::Display for EventPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventPhase::Upcoming => "upcoming",
            EventPhase::Today => "today",
            EventPhase::Past => "past",
            EventPhase::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[inline]
pub fn is_upcoming(instant: NaiveDateTime, now: NaiveDateTime) -> bool {
    instant > now
}

/// Ties go to "past": an event starting exactly at `now` has begun.
#[inline]
pub fn is_past(instant: NaiveDateTime, now: NaiveDateTime) -> bool {
    instant <= now
}

/// Classify an event from its raw fields.
pub fn event_phase(
    date: NaiveDate,
    time: Option<&str>,
    status: EventStatus,
    now: NaiveDateTime,
) -> EventPhase {
    if status == EventStatus::Cancelled {
        return EventPhase::Cancelled;
    }

    let instant = event_instant(date, time);
    if is_past(instant, now) {
        EventPhase::Past
    } else if instant.date() == now.date() {
        EventPhase::Today
    } else {
        EventPhase::Upcoming
    }
}

/// Timing annotation attached to events in API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTiming {
    pub starts_at: NaiveDateTime,
    pub phase: EventPhase,
    pub is_upcoming: bool,
    pub is_past: bool,
}

impl EventTiming {
    pub fn new(
        date: NaiveDate,
        time: Option<&str>,
        status: EventStatus,
        now: NaiveDateTime,
    ) -> Self {
        let starts_at = event_instant(date, time);
        Self {
            starts_at,
            phase: event_phase(date, time, status, now),
            is_upcoming: is_upcoming(starts_at, now),
            is_past: is_past(starts_at, now),
        }
    }

    pub fn for_event(event: &Event, now: NaiveDateTime) -> Self {
        Self::new(event.date, event.time.as_deref(), event.status, now)
    }
}

/// Split events into upcoming (soonest first) and past (most recent first).
///
/// Cancelled events appear in neither list.
pub fn split_by_time(events: &[Event], now: NaiveDateTime) -> (Vec<Event>, Vec<Event>) {
    let mut upcoming = Vec::new();
    let mut past = Vec::new();

    for event in events {
        match event.phase(now) {
            EventPhase::Cancelled => {}
            EventPhase::Past => past.push(event.clone()),
            EventPhase::Today | EventPhase::Upcoming => upcoming.push(event.clone()),
        }
    }

    upcoming.sort_by_key(|e| e.instant());
    past.sort_by_key(|e| std::cmp::Reverse(e.instant()));
    (upcoming, past)
}

// ============================================================================
// Classifier
// ============================================================================

/// Classifies events against an injected clock.
///
/// The clock is read once per call.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier<C = SystemClock> {
    clock: C,
}

impl<C: Clock> EventClassifier<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn instant(&self, event: &Event) -> NaiveDateTime {
        event.instant()
    }

    pub fn is_upcoming(&self, event: &Event) -> bool {
        event.is_upcoming(self.clock.now())
    }

    pub fn is_past(&self, event: &Event) -> bool {
        event.is_past(self.clock.now())
    }

    pub fn phase(&self, event: &Event) -> EventPhase {
        event.phase(self.clock.now())
    }

    pub fn timing(&self, event: &Event) -> EventTiming {
        event.timing(self.clock.now())
    }

    pub fn is_gallery_eligible(&self, event: &Event) -> bool {
        event.is_gallery_eligible(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        d.and_hms_opt(h, min, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_twelve_and_twenty_four_hour_agree() {
        let d = date(2024, 3, 15);
        assert_eq!(event_instant(d, Some("2:30 PM")), event_instant(d, Some("14:30")));
        assert_eq!(event_instant(d, Some("2:30 PM")), at(d, 14, 30));
    }

    #[test]
    fn test_midnight_and_noon() {
        assert_eq!(parse_clock("12:00 AM"), hm(0, 0));
        assert_eq!(parse_clock("12:00 PM"), hm(12, 0));
        assert_eq!(parse_clock("12:45 am"), hm(0, 45));
        assert_eq!(parse_clock("12:45 pm"), hm(12, 45));
    }

    #[test]
    fn test_meridiem_variants() {
        assert_eq!(parse_clock("9 AM"), hm(9, 0));
        assert_eq!(parse_clock("9:15am"), hm(9, 15));
        assert_eq!(parse_clock(" 7:05 Pm "), hm(19, 5));
        assert_eq!(parse_clock("11:59 PM"), hm(23, 59));
    }

    #[test]
    fn test_malformed_times_degrade_to_midnight() {
        assert_eq!(parse_clock(""), NaiveTime::MIN);
        assert_eq!(parse_clock("noon-ish"), NaiveTime::MIN);
        assert_eq!(parse_clock("25:00"), NaiveTime::MIN);
        assert_eq!(parse_clock("13:00 PM"), NaiveTime::MIN);
        assert_eq!(parse_clock("10:75"), NaiveTime::MIN);
    }

    #[test]
    fn test_meridiem_comes_from_the_start_time() {
        assert_eq!(parse_clock("10:00 AM - 2:00 PM"), hm(10, 0));
        assert_eq!(parse_clock("9:30 AM (Campus Plaza, 1pm lunch)"), hm(9, 30));
        assert_eq!(parse_clock("7 pm, doors at 6:30 am"), hm(19, 0));
        assert_eq!(parse_clock("11:59 p.m."), hm(23, 59));
        assert_eq!(parse_clock("8:15 A.M."), hm(8, 15));
    }

    #[test]
    fn test_clock_must_end_at_a_separator() {
        assert_eq!(parse_clock("123:00"), NaiveTime::MIN);
        assert_eq!(parse_clock("14:305"), NaiveTime::MIN);
        assert_eq!(parse_clock("9:15-10:00"), hm(9, 15));
    }

    #[test]
    fn test_unparsable_minutes_default_to_zero() {
        assert_eq!(parse_clock("3:xx PM"), hm(15, 0));
        assert_eq!(parse_clock("18h"), hm(18, 0));
    }

    #[test]
    fn test_missing_time_is_start_of_day() {
        let d = date(2024, 3, 15);
        assert_eq!(event_instant(d, None), at(d, 0, 0));
        assert_eq!(event_instant(d, Some("   ")), at(d, 0, 0));
    }

    #[test]
    fn test_today_without_time_is_past_at_noon() {
        let d = date(2024, 3, 15);
        let now = at(d, 12, 0);
        assert!(is_past(event_instant(d, None), now));
        assert_eq!(event_phase(d, None, EventStatus::Published, now), EventPhase::Past);
    }

    #[test]
    fn test_exact_instant_is_past() {
        let d = date(2024, 3, 15);
        let now = at(d, 14, 30);
        let instant = event_instant(d, Some("2:30 PM"));
        assert!(is_past(instant, now));
        assert!(!is_upcoming(instant, now));
    }

    #[test]
    fn test_upcoming_and_past_are_complements() {
        let d = date(2024, 3, 15);
        let times = [None, Some("9:00 AM"), Some("14:30"), Some("garbage"), Some("11:59 PM")];
        let mut now = at(date(2024, 3, 14), 0, 0);
        let end = at(date(2024, 3, 17), 0, 0);

        while now < end {
            for time in times {
                let instant = event_instant(d, time);
                assert!(is_upcoming(instant, now) ^ is_past(instant, now));
            }
            now += chrono::Duration::minutes(17);
        }
    }

    #[test]
    fn test_phase_today_and_upcoming() {
        let d = date(2024, 3, 15);
        let morning = at(d, 8, 0);
        assert_eq!(
            event_phase(d, Some("6:00 PM"), EventStatus::Published, morning),
            EventPhase::Today
        );
        assert_eq!(
            event_phase(date(2024, 3, 16), None, EventStatus::Published, morning),
            EventPhase::Upcoming
        );
        assert_eq!(
            event_phase(d, Some("7:00 AM"), EventStatus::Published, morning),
            EventPhase::Past
        );
    }

    #[test]
    fn test_cancelled_overrides_time() {
        let d = date(2024, 3, 15);
        for now in [at(date(2024, 1, 1), 0, 0), at(date(2025, 1, 1), 0, 0)] {
            assert_eq!(
                event_phase(d, Some("14:30"), EventStatus::Cancelled, now),
                EventPhase::Cancelled
            );
        }
    }

    #[test]
    fn test_timing_annotation() {
        let d = date(2024, 3, 15);
        let timing = EventTiming::new(d, Some("2:30 PM"), EventStatus::Published, at(d, 9, 0));
        assert_eq!(timing.starts_at, at(d, 14, 30));
        assert_eq!(timing.phase, EventPhase::Today);
        assert!(timing.is_upcoming);
        assert!(!timing.is_past);

        let json = serde_json::to_value(&timing).unwrap();
        assert_eq!(json["phase"], "today");
        assert_eq!(json["isUpcoming"], true);
    }

    #[test]
    fn test_split_by_time() {
        let now = at(date(2024, 3, 15), 12, 0);
        let events = vec![
            Event::new("old", date(2024, 1, 10)),
            Event::new("soon", date(2024, 3, 16)),
            Event::new("later", date(2024, 4, 1)),
            Event::new("recent", date(2024, 3, 14)),
            Event::new("gone", date(2024, 3, 20)).with_status(EventStatus::Cancelled),
            Event::new("tonight", date(2024, 3, 15)).with_time("8:00 PM"),
        ];

        let (upcoming, past) = split_by_time(&events, now);
        let upcoming: Vec<_> = upcoming.iter().map(|e| e.id.as_str()).collect();
        let past: Vec<_> = past.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(upcoming, vec!["tonight", "soon", "later"]);
        assert_eq!(past, vec!["recent", "old"]);
    }

    #[test]
    fn test_classifier_uses_injected_clock() {
        let d = date(2024, 3, 15);
        let event = Event::new("e1", d).with_time("14:30");

        let before = EventClassifier::new(FixedClock(at(d, 14, 29)));
        assert!(before.is_upcoming(&event));
        assert!(!before.is_gallery_eligible(&event));

        let after = EventClassifier::new(FixedClock(at(d, 14, 30)));
        assert!(after.is_past(&event));
        assert!(after.is_gallery_eligible(&event));
        assert_eq!(after.phase(&event), EventPhase::Past);
    }
}
