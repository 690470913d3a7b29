//! Batched, lazy loading of gallery previews for event lists.
//!
//! A list page wants a few photos for every past event it shows. Fetching all
//! of them at once bursts against the image-store-backed API, so the loader
//! fetches in small concurrent batches with a pause between batches, and keeps
//! only the first few images of each gallery.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::events::{Clock, Event, EventClassifier, GalleryImage, SystemClock};
use crate::metrics::{get_metrics, Metrics};

use super::{GalleryApi, GalleryClient};

#[derive(Debug, Default)]
struct LoaderState {
    /// Ids fetched successfully at least once.
    loaded: HashSet<String>,
    /// Ids scheduled by a call that has not settled them yet.
    loading: HashSet<String>,
    /// Bumped by `reset`; completions from an older epoch are discarded.
    epoch: u64,
    /// Per-id counterpart of `epoch`, bumped by `forget`.
    tokens: HashMap<String, u64>,
}

impl LoaderState {
    fn token(&self, event_id: &str) -> u64 {
        self.tokens.get(event_id).copied().unwrap_or(0)
    }
}

/// Summary of one `load_galleries_for` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Events considered after applying `max_events`.
    pub requested: usize,
    /// Events fetched by this call.
    pub scheduled: usize,
    /// Batches issued.
    pub batches: usize,
    /// Fetches that succeeded.
    pub loaded: usize,
    /// Ids whose fetch failed; they stay retryable.
    pub failed: Vec<String>,
}

/// Loads gallery previews for lists of events.
///
/// One loader per consumer (e.g. per UI session). Per event id the state moves
/// `unseen → loading → loaded`, or back to `unseen` when the fetch fails so a
/// later call retries it.
pub struct GalleryBatchLoader<A: ?Sized, C = SystemClock> {
    client: GalleryClient<A>,
    classifier: EventClassifier<C>,
    config: LoaderConfig,
    state: Mutex<LoaderState>,
    previews: RwLock<HashMap<String, Vec<GalleryImage>>>,
}

impl<A, C> GalleryBatchLoader<A, C>
where
    A: GalleryApi + ?Sized + 'static,
    C: Clock,
{
    /// Create a new loader.
    pub fn new(client: GalleryClient<A>, clock: C, config: LoaderConfig) -> Self {
        Self {
            client,
            classifier: EventClassifier::new(clock),
            config,
            state: Mutex::new(LoaderState::default()),
            previews: RwLock::new(HashMap::new()),
        }
    }

    /// Get the gallery client.
    pub fn client(&self) -> &GalleryClient<A> {
        &self.client
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fetch previews for the first `max_events` of `events`.
    ///
    /// Only past events are fetched, and ids already loaded or loading are
    /// skipped. Batches run strictly one after another; fetches inside a batch
    /// run concurrently and a failing fetch never aborts its siblings.
    pub async fn load_galleries_for(&self, events: &[Event], max_events: usize) -> LoadReport {
        let now = self.classifier.now();
        let candidates = &events[..events.len().min(max_events)];

        let (ids, epoch) = {
            let mut state = self.state.lock();
            let mut seen = HashSet::new();
            let mut ids = Vec::new();
            for event in candidates {
                if !event.is_gallery_eligible(now) || !seen.insert(event.id.as_str()) {
                    continue;
                }
                if state.loaded.contains(&event.id) || state.loading.contains(&event.id) {
                    continue;
                }
                ids.push((event.id.clone(), state.token(&event.id)));
            }
            state.loading.extend(ids.iter().map(|(id, _)| id.clone()));
            (ids, state.epoch)
        };

        let mut report = LoadReport {
            requested: candidates.len(),
            scheduled: ids.len(),
            ..LoadReport::default()
        };

        if ids.is_empty() {
            debug!(requested = report.requested, "No gallery previews to load");
            return report;
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = ids.len().div_ceil(batch_size);
        let metrics = get_metrics();

        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch_delay()).await;
            }

            metrics.gallery_batches_total.inc();
            debug!(
                batch = index + 1,
                batches = batch_count,
                size = batch.len(),
                "Fetching gallery batch"
            );

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|(id, token)| self.fetch_one(id, epoch, *token)),
            )
            .await;
            for ((id, _), ok) in batch.iter().zip(outcomes) {
                if ok {
                    report.loaded += 1;
                } else {
                    report.failed.push(id.clone());
                }
            }
            report.batches += 1;
        }

        info!(
            scheduled = report.scheduled,
            batches = report.batches,
            loaded = report.loaded,
            failed = report.failed.len(),
            "Gallery previews loaded"
        );
        report
    }

    /// Fetch one gallery and settle its state. Returns whether it succeeded.
    async fn fetch_one(&self, event_id: &str, epoch: u64, token: u64) -> bool {
        let metrics = get_metrics();
        metrics.gallery_fetches_total.inc();

        let result = {
            let _timer = Metrics::start_timer(&metrics.gallery_fetch_duration_seconds);
            self.client.gallery(event_id).await
        };

        let ok = result.is_ok();
        let mut state = self.state.lock();
        if state.epoch != epoch || state.token(event_id) != token {
            debug!(event_id, "Discarding gallery fetch from before reset or forget");
            return ok;
        }
        state.loading.remove(event_id);

        match result {
            Ok(images) => {
                state.loaded.insert(event_id.to_string());
                drop(state);

                let mut previews = self.previews.write();
                if images.is_empty() {
                    previews.remove(event_id);
                } else {
                    let preview = images.into_iter().take(self.config.preview_limit).collect();
                    previews.insert(event_id.to_string(), preview);
                }
            }
            Err(e) => {
                state.loaded.remove(event_id);
                drop(state);

                metrics.gallery_fetch_errors_total.inc();
                warn!(
                    event_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Gallery preview temporarily unavailable"
                );
            }
        }
        ok
    }

    /// Whether the event's gallery has been fetched successfully.
    pub fn is_loaded(&self, event_id: &str) -> bool {
        self.state.lock().loaded.contains(event_id)
    }

    /// Whether a fetch for the event is scheduled or running.
    pub fn is_loading(&self, event_id: &str) -> bool {
        self.state.lock().loading.contains(event_id)
    }

    /// Preview images stored for an event.
    pub fn previews_for(&self, event_id: &str) -> Option<Vec<GalleryImage>> {
        self.previews.read().get(event_id).cloned()
    }

    /// All stored previews, keyed by event id.
    pub fn previews(&self) -> HashMap<String, Vec<GalleryImage>> {
        self.previews.read().clone()
    }

    /// Forget one event so the next call fetches it again.
    ///
    /// Use after its gallery changed. A fetch for it still running is
    /// ignored when it settles.
    pub fn forget(&self, event_id: &str) {
        {
            let mut state = self.state.lock();
            state.loaded.remove(event_id);
            state.loading.remove(event_id);
            *state.tokens.entry(event_id.to_string()).or_insert(0) += 1;
        }
        self.previews.write().remove(event_id);
        self.client.invalidate(event_id);
    }

    /// Clear all state. Fetches still running are ignored when they settle.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.loaded.clear();
            state.loading.clear();
            state.tokens.clear();
            state.epoch += 1;
        }
        self.previews.write().clear();
        debug!("Gallery loader reset");
    }
}
