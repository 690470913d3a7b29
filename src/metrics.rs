//! Prometheus-compatible metrics for the gallery layer.
//!
//! Counters cover request deduplication and gallery fetching; a histogram
//! tracks per-event fetch latency.

use prometheus::{self, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new())).clone()
}

/// Latency buckets in seconds, 5ms to 10s.
fn default_latency_buckets() -> Vec<f64> {
    vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

/// All metrics for the gallery layer.
pub struct Metrics {
    /// Prometheus registry for all metrics.
    pub registry: Registry,

    // =========================================================================
    // Counters
    // =========================================================================
    /// Requests that joined an operation already in flight.
    pub dedup_hits_total: IntCounter,
    /// Requests that started a new operation.
    pub dedup_misses_total: IntCounter,
    /// Pending entries dropped by invalidation.
    pub dedup_invalidations_total: IntCounter,
    /// Per-event gallery fetches issued by the batch loader.
    pub gallery_fetches_total: IntCounter,
    /// Per-event gallery fetches that failed.
    pub gallery_fetch_errors_total: IntCounter,
    /// Batches started by the batch loader.
    pub gallery_batches_total: IntCounter,

    // =========================================================================
    // Gauges
    // =========================================================================
    /// Operations currently registered with a deduplicator.
    pub dedup_in_flight: IntGauge,

    // =========================================================================
    // Histograms (durations in seconds)
    // =========================================================================
    /// Per-event gallery fetch duration in seconds.
    pub gallery_fetch_duration_seconds: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with all metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let dedup_hits_total = IntCounter::new(
            "event_gallery_dedup_hits_total",
            "Requests joined to an in-flight operation",
        )
        .expect("failed to create counter");
        let dedup_misses_total = IntCounter::new(
            "event_gallery_dedup_misses_total",
            "Requests that started a new operation",
        )
        .expect("failed to create counter");
        let dedup_invalidations_total = IntCounter::new(
            "event_gallery_dedup_invalidations_total",
            "Pending entries removed by invalidation",
        )
        .expect("failed to create counter");
        let gallery_fetches_total = IntCounter::new(
            "event_gallery_fetches_total",
            "Gallery fetches issued by the batch loader",
        )
        .expect("failed to create counter");
        let gallery_fetch_errors_total = IntCounter::new(
            "event_gallery_fetch_errors_total",
            "Gallery fetches that failed",
        )
        .expect("failed to create counter");
        let gallery_batches_total = IntCounter::new(
            "event_gallery_batches_total",
            "Batches started by the batch loader",
        )
        .expect("failed to create counter");

        let dedup_in_flight = IntGauge::new(
            "event_gallery_dedup_in_flight",
            "Operations currently in flight",
        )
        .expect("failed to create gauge");

        let gallery_fetch_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "event_gallery_fetch_duration_seconds",
                "Gallery fetch duration in seconds",
            )
            .buckets(default_latency_buckets()),
        )
        .expect("failed to create histogram");

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(dedup_hits_total.clone()),
            Box::new(dedup_misses_total.clone()),
            Box::new(dedup_invalidations_total.clone()),
            Box::new(gallery_fetches_total.clone()),
            Box::new(gallery_fetch_errors_total.clone()),
            Box::new(gallery_batches_total.clone()),
            Box::new(dedup_in_flight.clone()),
            Box::new(gallery_fetch_duration_seconds.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("failed to register metric");
        }

        Self {
            registry,
            dedup_hits_total,
            dedup_misses_total,
            dedup_invalidations_total,
            gallery_fetches_total,
            gallery_fetch_errors_total,
            gallery_batches_total,
            dedup_in_flight,
            gallery_fetch_duration_seconds,
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Export metrics as JSON.
    pub fn export_json(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: MetricsCounters {
                dedup_hits_total: self.dedup_hits_total.get(),
                dedup_misses_total: self.dedup_misses_total.get(),
                dedup_invalidations_total: self.dedup_invalidations_total.get(),
                gallery_fetches_total: self.gallery_fetches_total.get(),
                gallery_fetch_errors_total: self.gallery_fetch_errors_total.get(),
                gallery_batches_total: self.gallery_batches_total.get(),
            },
            gauges: MetricsGauges {
                dedup_in_flight: self.dedup_in_flight.get(),
            },
            histograms: MetricsHistograms {
                gallery_fetch_duration_seconds: HistogramSnapshot::from_prometheus(
                    &self.gallery_fetch_duration_seconds,
                ),
            },
        }
    }

    /// Start a timer that records duration to a histogram when dropped.
    pub fn start_timer(histogram: &Histogram) -> HistogramTimer {
        HistogramTimer {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

/// Timer that records duration to a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.histogram.observe(duration.as_secs_f64());
    }
}

/// Snapshot of all metrics for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: MetricsCounters,
    pub gauges: MetricsGauges,
    pub histograms: MetricsHistograms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsCounters {
    pub dedup_hits_total: u64,
    pub dedup_misses_total: u64,
    pub dedup_invalidations_total: u64,
    pub gallery_fetches_total: u64,
    pub gallery_fetch_errors_total: u64,
    pub gallery_batches_total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsGauges {
    pub dedup_in_flight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsHistograms {
    pub gallery_fetch_duration_seconds: HistogramSnapshot,
}

/// Snapshot of a histogram for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
}

impl HistogramSnapshot {
    /// Create a snapshot from a prometheus histogram.
    pub fn from_prometheus(h: &Histogram) -> Self {
        let sample_count = h.get_sample_count();
        let sample_sum = h.get_sample_sum();
        let mean = if sample_count > 0 {
            Some(sample_sum / sample_count as f64)
        } else {
            None
        };
        Self {
            count: sample_count,
            sum: sample_sum,
            mean,
        }
    }
}
