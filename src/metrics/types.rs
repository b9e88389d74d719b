//! Core metric types: Counter, Histogram, Gauge
//!
//! Thread-safe metric primitives keyed by a rendered label string
//! (`key1="value1",key2="value2"`). Series are created lazily on first use
//! and live for the lifetime of the process; there is no eviction, so every
//! label value fed into these types must come from a bounded domain.

use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Render label pairs in exposition order, escaping values.
///
/// ```
/// use lantern::metrics::render_labels;
///
/// assert_eq!(
///     render_labels(&[("method", "GET"), ("route", "/users/:id")]),
///     "method=\"GET\",route=\"/users/:id\""
/// );
/// assert_eq!(render_labels(&[]), "");
/// ```
pub fn render_labels(labels: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_label_value(value));
        out.push('"');
    }
    out
}

/// Escape a label value for the text exposition format.
fn escape_label_value(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Run `f` against the series for `labels`, creating it with `init` if absent.
///
/// Existing series only take the read lock; the write lock is held just long
/// enough to insert a new one.
fn with_series<T, R>(
    series: &RwLock<BTreeMap<String, T>>,
    labels: &str,
    init: impl FnOnce() -> T,
    f: impl FnOnce(&T) -> R,
) -> R {
    {
        let map = series.read();
        if let Some(existing) = map.get(labels) {
            return f(existing);
        }
    }

    let mut map = series.write();
    let entry = map.entry(labels.to_string()).or_insert_with(init);
    f(entry)
}

/// Thread-safe labeled counter.
///
/// Counters are monotonically increasing values (e.g., total requests, errors).
#[derive(Debug, Default)]
pub struct LabeledCounter {
    values: RwLock<BTreeMap<String, AtomicU64>>,
}

impl LabeledCounter {
    /// Create a new labeled counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment counter by 1 for the given label combination.
    pub fn inc(&self, labels: &str) {
        self.add(labels, 1);
    }

    /// Add value to counter for the given label combination.
    pub fn add(&self, labels: &str, value: u64) {
        with_series(
            &self.values,
            labels,
            || AtomicU64::new(0),
            |counter| counter.fetch_add(value, Ordering::Relaxed),
        );
    }

    /// Get current value for the given label combination.
    pub fn get(&self, labels: &str) -> u64 {
        self.values
            .read()
            .get(labels)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All label/value pairs, ordered by label string.
    pub fn get_all(&self) -> Vec<(String, u64)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Thread-safe gauge (can increase or decrease).
///
/// Used for point-in-time values such as the number of in-flight requests.
#[derive(Debug, Default)]
pub struct Gauge {
    values: RwLock<BTreeMap<String, AtomicI64>>,
}

impl Gauge {
    /// Create a new gauge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set gauge to a specific value.
    pub fn set(&self, labels: &str, value: i64) {
        with_series(
            &self.values,
            labels,
            || AtomicI64::new(0),
            |gauge| gauge.store(value, Ordering::Relaxed),
        );
    }

    /// Increment gauge by 1.
    pub fn inc(&self, labels: &str) {
        self.add(labels, 1);
    }

    /// Decrement gauge by 1.
    pub fn dec(&self, labels: &str) {
        self.add(labels, -1);
    }

    /// Add value to gauge (can be negative).
    pub fn add(&self, labels: &str, value: i64) {
        with_series(
            &self.values,
            labels,
            || AtomicI64::new(0),
            |gauge| gauge.fetch_add(value, Ordering::Relaxed),
        );
    }

    /// Get current value for the given label combination.
    pub fn get(&self, labels: &str) -> i64 {
        self.values
            .read()
            .get(labels)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All label/value pairs, ordered by label string.
    pub fn get_all(&self) -> Vec<(String, i64)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Per-label-combination histogram state.
#[derive(Debug)]
struct HistogramSeries {
    counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl HistogramSeries {
    fn new(buckets: usize) -> Self {
        Self {
            counts: (0..buckets).map(|_| AtomicU64::new(0)).collect(),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, bounds: &[f64], value: f64) {
        // Total first so a concurrent reader never sees a bucket above it.
        self.count.fetch_add(1, Ordering::Relaxed);

        for (bound, slot) in bounds.iter().zip(&self.counts) {
            if value <= *bound {
                slot.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Thread-safe histogram with fixed bucket boundaries.
///
/// Histograms track the distribution of values (e.g., request durations).
/// Bounds are set at construction and never change.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    series: RwLock<BTreeMap<String, HistogramSeries>>,
}

impl Histogram {
    /// Create a new histogram with the given bucket boundaries.
    ///
    /// Boundaries must be finite and strictly ascending; the registry builder
    /// checks this before constructing one.
    pub fn new(buckets: &[f64]) -> Self {
        Self {
            buckets: buckets.to_vec(),
            series: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get the bucket boundaries.
    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Observe a value for the given label combination.
    ///
    /// Every bucket whose bound is `>=` the value is incremented.
    pub fn observe(&self, labels: &str, value: f64) {
        let bounds = &self.buckets;
        with_series(
            &self.series,
            labels,
            || HistogramSeries::new(bounds.len()),
            |series| series.observe(bounds, value),
        );
    }

    /// Histogram data for every label combination, ordered by label string.
    pub fn get_all(&self) -> Vec<HistogramData> {
        self.series
            .read()
            .iter()
            .map(|(labels, series)| HistogramData {
                labels: labels.clone(),
                buckets: self.buckets.clone(),
                counts: series
                    .counts
                    .iter()
                    .map(|c| c.load(Ordering::Relaxed))
                    .collect(),
                sum: f64::from_bits(series.sum_bits.load(Ordering::Relaxed)),
                count: series.count.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// Histogram data for a single label combination.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramData {
    /// Label string (e.g., `method="GET",route="/api"`)
    pub labels: String,
    /// Bucket boundaries
    pub buckets: Vec<f64>,
    /// Cumulative counts for each bucket
    pub counts: Vec<u64>,
    /// Sum of all observed values
    pub sum: f64,
    /// Total number of observations
    pub count: u64,
}

/// Histogram buckets for HTTP request durations (in seconds), 5ms to 10s.
pub const HTTP_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_render_labels_escapes_values() {
        assert_eq!(
            render_labels(&[("ua", "say \"hi\"\\\n")]),
            r#"ua="say \"hi\"\\\n""#
        );
    }

    #[test]
    fn test_counter_basic() {
        let counter = LabeledCounter::new();
        counter.inc("method=\"GET\"");
        counter.inc("method=\"GET\"");
        counter.inc("method=\"POST\"");

        assert_eq!(counter.get("method=\"GET\""), 2);
        assert_eq!(counter.get("method=\"POST\""), 1);
        assert_eq!(counter.get("method=\"PUT\""), 0);
    }

    #[test]
    fn test_counter_get_all_is_sorted() {
        let counter = LabeledCounter::new();
        counter.add("status=\"500\"", 1);
        counter.add("status=\"200\"", 7);

        assert_eq!(
            counter.get_all(),
            vec![
                ("status=\"200\"".to_string(), 7),
                ("status=\"500\"".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let counter = Arc::new(LabeledCounter::new());
        let threads = 16;
        let per_thread = 5_000;

        std::thread::scope(|scope| {
            for _ in 0..threads {
                let counter = counter.clone();
                // All threads race to create the same series.
                scope.spawn(move || {
                    for _ in 0..per_thread {
                        counter.inc("a=\"1\"");
                    }
                });
            }
        });

        assert_eq!(counter.get("a=\"1\""), threads * per_thread);
    }

    #[test]
    fn test_gauge_basic() {
        let gauge = Gauge::new();
        gauge.set("", 10);
        assert_eq!(gauge.get(""), 10);

        gauge.inc("");
        assert_eq!(gauge.get(""), 11);

        gauge.dec("");
        gauge.dec("");
        assert_eq!(gauge.get(""), 9);
    }

    #[test]
    fn test_gauge_can_go_negative() {
        let gauge = Gauge::new();
        gauge.dec("app=\"x\"");
        assert_eq!(gauge.get("app=\"x\""), -1);
    }

    #[test]
    fn test_histogram_basic() {
        let hist = Histogram::new(&[0.1, 0.5, 1.0]);
        hist.observe("", 0.05);
        hist.observe("", 0.3);
        hist.observe("", 0.8);
        hist.observe("", 4.0);

        let data = hist.get_all();
        assert_eq!(data.len(), 1);

        let d = &data[0];
        assert_eq!(d.count, 4);
        assert!((d.sum - 5.15).abs() < 1e-9);
        assert_eq!(d.counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_histogram_bound_is_inclusive() {
        let hist = Histogram::new(&[0.1, 0.5]);
        hist.observe("", 0.1);
        assert_eq!(hist.get_all()[0].counts, vec![1, 1]);
    }

    #[test]
    fn test_histogram_labels() {
        let hist = Histogram::new(&[1.0, 5.0]);
        hist.observe("method=\"POST\"", 2.0);
        hist.observe("method=\"GET\"", 0.5);

        let data = hist.get_all();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].labels, "method=\"GET\"");
        assert_eq!(data[0].counts, vec![1, 1]);
        assert_eq!(data[1].counts, vec![0, 1]);
    }

    #[test]
    fn test_histogram_concurrent_observations() {
        let hist = Arc::new(Histogram::new(HTTP_DURATION_BUCKETS));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let hist = hist.clone();
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        hist.observe("", 0.5);
                    }
                });
            }
        });

        let d = &hist.get_all()[0];
        assert_eq!(d.count, 8_000);
        assert!((d.sum - 4_000.0).abs() < 1e-6);
        assert_eq!(*d.counts.last().unwrap(), 8_000);
        assert_eq!(d.counts[5], 0); // 0.25 bucket
    }
}
