//! Preview loading through the client and the in-memory store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

use event_gallery::{
    get_metrics, Event, FetchError, FixedClock, GalleryApi, GalleryBatchLoader, GalleryClient,
    GalleryImage, ImageUpload, InMemoryGalleryApi, LoaderConfig,
};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn past_event(id: &str, day: u32) -> Event {
    Event::new(id, NaiveDate::from_ymd_opt(2024, 5, day).unwrap()).with_time("7:00 PM")
}

fn images(id: &str, count: usize) -> Vec<GalleryImage> {
    (0..count)
        .map(|i| GalleryImage::new(format!("{}/{}", id, i), format!("https://img/{}/{}.jpg", id, i)))
        .collect()
}

/// In-memory store whose listed ids fail on their first list call.
struct FlakyApi {
    inner: InMemoryGalleryApi,
    fail_once: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
}

impl FlakyApi {
    fn new(inner: InMemoryGalleryApi, fail_once: &[&str]) -> Self {
        Self {
            inner,
            fail_once: Mutex::new(fail_once.iter().map(|id| id.to_string()).collect()),
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GalleryApi for FlakyApi {
    async fn list_images(&self, event_id: &str) -> Result<Vec<GalleryImage>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_once.lock().remove(event_id) {
            return Err(FetchError::Http {
                status: 503,
                message: "image store unavailable".to_string(),
            });
        }
        self.inner.list_images(event_id).await
    }

    async fn upload_image(
        &self,
        event_id: &str,
        upload: ImageUpload,
    ) -> Result<GalleryImage, FetchError> {
        self.inner.upload_image(event_id, upload).await
    }

    async fn delete_image(&self, event_id: &str, public_id: &str) -> Result<(), FetchError> {
        self.inner.delete_image(event_id, public_id).await
    }

    async fn update_caption(
        &self,
        event_id: &str,
        public_id: &str,
        caption: Option<String>,
    ) -> Result<GalleryImage, FetchError> {
        self.inner.update_caption(event_id, public_id, caption).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_list_page_previews() {
    let store = InMemoryGalleryApi::new();
    let mut events = Vec::new();
    for day in 1..=8 {
        let id = format!("past-{}", day);
        store.insert_event(id.clone(), images(&id, day as usize % 5));
        events.push(past_event(&id, day));
    }
    events.push(
        Event::new("next-week", NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()).with_time("6 PM"),
    );

    let api = Arc::new(store);
    let loader = GalleryBatchLoader::new(
        GalleryClient::new(Arc::clone(&api)),
        FixedClock(now()),
        LoaderConfig::default(),
    );

    let report = loader.load_galleries_for(&events, 12).await;
    assert_eq!(report.requested, 9);
    assert_eq!(report.scheduled, 8);
    assert_eq!(report.batches, 3);
    assert_eq!(report.loaded, 8);
    assert!(report.failed.is_empty());

    // Empty galleries are loaded but store no preview; others keep at most 3.
    assert!(loader.is_loaded("past-5"));
    assert!(loader.previews_for("past-5").is_none());
    assert_eq!(loader.previews_for("past-4").unwrap().len(), 3);
    assert_eq!(loader.previews_for("past-2").unwrap().len(), 2);
    assert!(!loader.is_loaded("next-week"));

    // A second visit fetches nothing.
    let again = loader.load_galleries_for(&events, 12).await;
    assert_eq!(again.scheduled, 0);

    // Metrics are process-wide, so other tests may have added to them.
    let metrics = get_metrics();
    let snapshot = metrics.export_json();
    assert!(snapshot.counters.gallery_fetches_total >= 8);
    assert!(snapshot.counters.gallery_batches_total >= 3);
    assert!(snapshot.histograms.gallery_fetch_duration_seconds.count >= 8);
    let text = metrics.export_prometheus();
    assert!(text.contains("event_gallery_fetches_total"));
    assert!(text.contains("event_gallery_fetch_duration_seconds_bucket"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_gallery_recovers_on_next_call() {
    let store = InMemoryGalleryApi::new();
    store.insert_event("a", images("a", 4));
    store.insert_event("b", images("b", 1));
    let api = Arc::new(FlakyApi::new(store, &["a"]));

    let loader = GalleryBatchLoader::new(
        GalleryClient::new(Arc::clone(&api)),
        FixedClock(now()),
        LoaderConfig::default(),
    );
    let events = vec![past_event("a", 10), past_event("b", 11)];

    let first = loader.load_galleries_for(&events, 12).await;
    assert_eq!(first.failed, vec!["a".to_string()]);
    assert!(!loader.is_loaded("a"));
    assert!(loader.previews_for("a").is_none());
    assert_eq!(loader.previews_for("b").unwrap().len(), 1);

    let second = loader.load_galleries_for(&events, 12).await;
    assert_eq!(second.scheduled, 1);
    assert_eq!(second.loaded, 1);
    assert_eq!(loader.previews_for("a").unwrap().len(), 3);
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_forget_after_upload_refetches() {
    let store = InMemoryGalleryApi::new();
    store.insert_event("a", Vec::new());
    let api = Arc::new(store);

    let loader = GalleryBatchLoader::new(
        GalleryClient::new(Arc::clone(&api)),
        FixedClock(now()),
        LoaderConfig::default(),
    );
    let events = vec![past_event("a", 20)];

    loader.load_galleries_for(&events, 12).await;
    assert!(loader.previews_for("a").is_none());

    let upload = ImageUpload::new("stage.jpg", "image/jpeg", Bytes::from_static(b"jpeg"))
        .with_caption("Main stage");
    loader.client().upload("a", upload).await.unwrap();
    loader.forget("a");

    let report = loader.load_galleries_for(&events, 12).await;
    assert_eq!(report.loaded, 1);
    let preview = loader.previews_for("a").unwrap();
    assert_eq!(preview[0].caption.as_deref(), Some("Main stage"));
}

#[tokio::test]
async fn test_shared_client_deduplicates_across_loaders() {
    let store = InMemoryGalleryApi::new();
    store.insert_event("a", images("a", 2));
    let api = Arc::new(FlakyApi::new(store, &[]));
    let client = GalleryClient::new(Arc::clone(&api));

    let first = GalleryBatchLoader::new(client.clone(), FixedClock(now()), LoaderConfig::default());
    let second = GalleryBatchLoader::new(client, FixedClock(now()), LoaderConfig::default());
    let events = vec![past_event("a", 1)];

    let (a, b) = tokio::join!(
        first.load_galleries_for(&events, 12),
        second.load_galleries_for(&events, 12)
    );
    assert_eq!(a.loaded, 1);
    assert_eq!(b.loaded, 1);
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
}
