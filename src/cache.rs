//! In-flight request deduplication.
//!
//! A [`Deduplicator`] keeps one shared handle per logical request key while
//! the request is running. Callers asking for a key that is already in flight
//! join the existing request instead of starting a new one, and all of them
//! observe the same value or the same error.
//!
//! Entries only live while their operation runs: the spawned task removes its
//! own entry when it settles, whether it succeeded, failed or panicked.
//! [`Deduplicator::clear_cache`] drops entries early so the next caller starts
//! a fresh request, which is how writes invalidate stale reads.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::FetchError;
use crate::metrics::get_metrics;

/// Result of a deduplicated operation.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

type PendingFuture<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

// ============================================================================
// Request keys
// ============================================================================

/// Key identifying one logical request: `resource:id:operation`.
///
/// Components are escaped so that distinct requests never render to the same
/// string, even when an identifier contains the separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    resource: String,
    id: String,
    operation: String,
}

impl RequestKey {
    /// Create a new request key.
    pub fn new(
        resource: impl Into<String>,
        id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
            operation: operation.into(),
        }
    }

    /// Key for listing an event's gallery.
    pub fn gallery(event_id: impl Into<String>) -> Self {
        Self::new("gallery", event_id, "list")
    }

    /// Prefix shared by every operation on `resource:id`.
    ///
    /// The trailing separator keeps id `4` from matching id `42`.
    pub fn scope(resource: &str, id: &str) -> String {
        format!("{}:{}:", escape(resource), escape(id))
    }

    /// Invalidation prefix for everything cached about an event's gallery.
    pub fn gallery_scope(event_id: &str) -> String {
        Self::scope("gallery", event_id)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            escape(&self.resource),
            escape(&self.id),
            escape(&self.operation)
        )
    }
}

impl From<RequestKey> for String {
    fn from(key: RequestKey) -> Self {
        key.to_string()
    }
}

impl From<&RequestKey> for String {
    fn from(key: &RequestKey) -> Self {
        key.to_string()
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace(':', "%3A")
}

// ============================================================================
// Deduplicator
// ============================================================================

struct PendingEntry<T> {
    generation: u64,
    future: PendingFuture<T>,
}

struct Inner<T> {
    pending: Mutex<HashMap<String, PendingEntry<T>>>,
    next_generation: AtomicU64,
}

/// Removes its entry when the owning operation settles.
///
/// Lives inside the spawned task, so it also runs when the operation panics.
struct PendingGuard<T> {
    inner: Arc<Inner<T>>,
    key: String,
    generation: u64,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        let mut pending = self.inner.pending.lock();
        // An invalidation may have replaced our entry with a newer one.
        if pending
            .get(&self.key)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            pending.remove(&self.key);
        }
        get_metrics().dedup_in_flight.dec();
    }
}

/// Shares one in-flight operation between all callers of the same key.
///
/// Cloning is cheap and clones share state. Create one per consumer rather
/// than relying on a process-wide instance.
pub struct Deduplicator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Deduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Deduplicator<T> {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Run `operation` unless a request for `key` is already in flight.
    ///
    /// When one is, `operation` is not invoked and the caller waits for the
    /// existing request. New operations are spawned on the Tokio runtime and
    /// run to completion even if every caller stops waiting.
    ///
    /// `operation` is invoked while the registry is locked, so it must only
    /// build its future and not call back into this deduplicator. If it
    /// panics, the panic reaches the caller and nothing is registered.
    pub async fn deduplicate<F, Fut>(&self, key: impl Into<String>, operation: F) -> FetchResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let key = key.into();
        let metrics = get_metrics();

        let future = {
            let mut pending = self.inner.pending.lock();
            if let Some(entry) = pending.get(&key) {
                debug!(key = %key, "Joining in-flight request");
                metrics.dedup_hits_total.inc();
                entry.future.clone()
            } else {
                debug!(key = %key, "Starting request");
                metrics.dedup_misses_total.inc();

                // Build the future before the guard exists: a guard dropped
                // while this lock is held would deadlock on it.
                let task = operation();

                metrics.dedup_in_flight.inc();
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let guard = PendingGuard {
                    inner: Arc::clone(&self.inner),
                    key: key.clone(),
                    generation,
                };
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    task.await
                });

                let future = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(FetchError::Aborted(e.to_string())),
                    }
                }
                .boxed()
                .shared();

                pending.insert(
                    key,
                    PendingEntry {
                        generation,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        future.await
    }

    /// Drop pending entries whose key contains `pattern`, or all entries.
    ///
    /// Running operations are not cancelled; later callers simply start fresh
    /// requests. Returns the number of entries removed.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = {
            let mut pending = self.inner.pending.lock();
            let before = pending.len();
            match pattern {
                Some(pattern) => pending.retain(|key, _| !key.contains(pattern)),
                None => pending.clear(),
            }
            before - pending.len()
        };

        if removed > 0 {
            debug!(pattern = ?pattern, removed, "Invalidated pending requests");
            get_metrics().dedup_invalidations_total.inc_by(removed as u64);
        }
        removed
    }

    /// Whether a request for `key` is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.inner.pending.lock().contains_key(key)
    }

    /// Keys of all in-flight requests, sorted.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.pending.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
