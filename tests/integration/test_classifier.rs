//! Classification through the public API.

use chrono::{NaiveDate, NaiveDateTime};

use event_gallery::{
    split_by_time, Event, EventClassifier, EventPhase, EventStatus, EventTiming, FixedClock,
};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn event(id: &str, date: (i32, u32, u32), time: Option<&str>) -> Event {
    let event = Event::new(id, NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap());
    match time {
        Some(time) => event.with_time(time),
        None => event,
    }
}

#[test]
fn test_upcoming_and_past_are_complementary() {
    let now = at(2024, 3, 15, 12, 0);
    let times = [
        None,
        Some(""),
        Some("9:00 AM"),
        Some("11:59"),
        Some("12:00 PM"),
        Some("12:01"),
        Some("2:30 PM"),
        Some("not a time"),
    ];

    for day in 14..=16 {
        for time in times {
            let e = event("e", (2024, 3, day), time);
            assert_ne!(
                e.is_upcoming(now),
                e.is_past(now),
                "day {} time {:?}",
                day,
                time
            );
        }
    }
}

#[test]
fn test_twelve_and_twenty_four_hour_forms_agree() {
    let now = at(2024, 3, 15, 12, 0);
    let twelve = event("a", (2024, 3, 15), Some("2:30 PM"));
    let twenty_four = event("b", (2024, 3, 15), Some("14:30"));

    assert_eq!(twelve.instant(), twenty_four.instant());
    assert_eq!(twelve.phase(now), twenty_four.phase(now));
    assert_eq!(twelve.phase(now), EventPhase::Today);
}

#[test]
fn test_noon_boundary() {
    let classifier = EventClassifier::new(FixedClock(at(2024, 3, 15, 12, 0)));

    assert!(classifier.is_past(&event("noon", (2024, 3, 15), Some("12:00 PM"))));
    assert!(classifier.is_upcoming(&event("later", (2024, 3, 15), Some("12:01"))));
    assert!(classifier.is_past(&event("midnight", (2024, 3, 15), Some("12:00 AM"))));
    // No time means start of day, so today's untimed event has started.
    assert!(classifier.is_past(&event("untimed", (2024, 3, 15), None)));
}

#[test]
fn test_cancelled_events_are_never_eligible() {
    let now = at(2024, 3, 15, 12, 0);
    let cancelled = event("c", (2024, 3, 1), None).with_status(EventStatus::Cancelled);

    let timing = EventTiming::for_event(&cancelled, now);
    assert_eq!(timing.phase, EventPhase::Cancelled);
    assert!(timing.is_past);
    assert!(!cancelled.is_gallery_eligible(now));
}

#[test]
fn test_event_json_from_site() {
    let json = r#"[
        {"_id": "65f1", "title": "Spring Fest", "date": "2024-03-15T00:00:00.000Z", "time": "2:30 PM", "status": "published"},
        {"_id": "65f2", "date": "2024-03-10", "status": "published", "galleryImages": []},
        {"_id": "65f3", "date": "2024-03-20", "time": "18:00", "status": "published"}
    ]"#;
    let events: Vec<Event> = serde_json::from_str(json).unwrap();
    let now = at(2024, 3, 15, 15, 0);

    let (upcoming, past) = split_by_time(&events, now);
    let upcoming: Vec<&str> = upcoming.iter().map(|e| e.id.as_str()).collect();
    let past: Vec<&str> = past.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(upcoming, vec!["65f3"]);
    assert_eq!(past, vec!["65f1", "65f2"]);
}

#[test]
fn test_timing_serializes_camel_case() {
    let timing = EventTiming::for_event(
        &event("e", (2024, 3, 20), Some("6 PM")),
        at(2024, 3, 15, 12, 0),
    );
    let value = serde_json::to_value(&timing).unwrap();

    assert_eq!(value["startsAt"], "2024-03-20T18:00:00");
    assert_eq!(value["phase"], "upcoming");
    assert_eq!(value["isUpcoming"], true);
    assert_eq!(value["isPast"], false);
}
