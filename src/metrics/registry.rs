//! MetricRegistry - metric registration, mutation and snapshots
//!
//! Metrics are declared once through the builder, then mutated by name from
//! any number of concurrent requests. The registry is shared through an
//! `Arc` and handed explicitly to everything that records into it; there is
//! no global instance, so tests can build a fresh registry each.
//!
//! # Label cardinality
//!
//! Every series lives until the process exits. Any label added to a metric
//! here must be fed from a normalizer with a bounded output domain, like
//! [`normalize_method`](super::normalize_method) and
//! [`normalize_country`](super::normalize_country), or the registry will
//! grow without limit. [`normalize_route`](super::normalize_route) is bounded
//! for matched routes only; unmatched paths keep their non-numeric segments.

use super::types::{
    render_labels, Gauge, Histogram, HistogramData, LabeledCounter, HTTP_DURATION_BUCKETS,
};
use crate::error::MetricsError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Total HTTP requests, by method, route, status, app and country.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// HTTP request duration histogram in seconds.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
/// Requests currently being processed.
pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
/// HTTP responses with status >= 400, split by error type.
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";
/// Application-level business events.
pub const USER_ACTIONS_TOTAL: &str = "user_actions_total";

/// Kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic counter
    Counter,
    /// Up/down gauge
    Gauge,
    /// Bucketed histogram
    Histogram,
}

impl MetricKind {
    /// Name used in `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric definition with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDef {
    /// Metric name (e.g., `http_requests_total`)
    pub name: String,
    /// Help text describing the metric
    pub help: String,
    /// Label names for this metric, in exposition order
    pub labels: Vec<String>,
    /// Metric kind
    pub kind: MetricKind,
}

impl MetricDef {
    /// Check caller-supplied labels against the declared names and render them.
    fn render(&self, labels: &[(&str, &str)]) -> Result<String, MetricsError> {
        let matches = labels.len() == self.labels.len()
            && labels
                .iter()
                .zip(&self.labels)
                .all(|((key, _), declared)| key == declared);

        if !matches {
            return Err(MetricsError::LabelMismatch {
                metric: self.name.clone(),
                expected: self.labels.clone(),
                got: labels.iter().map(|(k, _)| k.to_string()).collect(),
            });
        }

        Ok(render_labels(labels))
    }
}

/// Current values of every series of one metric.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValues {
    /// Counter values by rendered label string
    Counter(Vec<(String, u64)>),
    /// Gauge values by rendered label string
    Gauge(Vec<(String, i64)>),
    /// Histogram state by rendered label string
    Histogram(Vec<HistogramData>),
}

impl SeriesValues {
    /// Whether the metric has no series yet.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Counter(v) => v.is_empty(),
            Self::Gauge(v) => v.is_empty(),
            Self::Histogram(v) => v.is_empty(),
        }
    }
}

/// Point-in-time copy of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Definition
    pub def: MetricDef,
    /// Series values, ordered by label string
    pub values: SeriesValues,
}

/// Central registry for application metrics.
///
/// # Example
///
/// ```
/// use lantern::metrics::MetricRegistry;
///
/// let metrics = MetricRegistry::builder()
///     .app_name("my-app")
///     .counter("jobs_total", &["status"], "Total jobs processed")
///     .build()
///     .unwrap();
///
/// metrics.increment_counter("jobs_total", &[("status", "done")]).unwrap();
/// assert_eq!(metrics.counter("jobs_total").unwrap().get("status=\"done\""), 1);
/// ```
#[derive(Debug)]
pub struct MetricRegistry {
    app_name: String,
    counters: BTreeMap<String, (MetricDef, LabeledCounter)>,
    histograms: BTreeMap<String, (MetricDef, Histogram)>,
    gauges: BTreeMap<String, (MetricDef, Gauge)>,
}

impl MetricRegistry {
    /// Create a new builder.
    pub fn builder() -> MetricRegistryBuilder {
        MetricRegistryBuilder::default()
    }

    /// Registry with the standard request metrics for `app_name`.
    pub fn for_requests(app_name: impl Into<String>) -> Result<Self, MetricsError> {
        Self::builder()
            .app_name(app_name)
            .with_request_metrics()
            .build()
    }

    /// Get the application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Get a counter by name.
    pub fn counter(&self, name: &str) -> Option<&LabeledCounter> {
        self.counters.get(name).map(|(_, c)| c)
    }

    /// Get a histogram by name.
    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name).map(|(_, h)| h)
    }

    /// Get a gauge by name.
    pub fn gauge(&self, name: &str) -> Option<&Gauge> {
        self.gauges.get(name).map(|(_, g)| g)
    }

    /// Check if a counter exists.
    pub fn has_counter(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    /// Check if a histogram exists.
    pub fn has_histogram(&self, name: &str) -> bool {
        self.histograms.contains_key(name)
    }

    /// Check if a gauge exists.
    pub fn has_gauge(&self, name: &str) -> bool {
        self.gauges.contains_key(name)
    }

    /// Increment a counter series by one.
    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        let (def, counter) = self
            .counters
            .get(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;
        counter.inc(&def.render(labels)?);
        Ok(())
    }

    /// Record one observation in a histogram series.
    pub fn observe_histogram(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<(), MetricsError> {
        let (def, histogram) = self
            .histograms
            .get(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;
        histogram.observe(&def.render(labels)?, value);
        Ok(())
    }

    /// Set a gauge series to `value`.
    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: i64) -> Result<(), MetricsError> {
        let (def, gauge) = self.gauge_entry(name)?;
        gauge.set(&def.render(labels)?, value);
        Ok(())
    }

    /// Increment a gauge series by one.
    pub fn inc_gauge(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        let (def, gauge) = self.gauge_entry(name)?;
        gauge.inc(&def.render(labels)?);
        Ok(())
    }

    /// Decrement a gauge series by one.
    pub fn dec_gauge(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        let (def, gauge) = self.gauge_entry(name)?;
        gauge.dec(&def.render(labels)?);
        Ok(())
    }

    fn gauge_entry(&self, name: &str) -> Result<&(MetricDef, Gauge), MetricsError> {
        self.gauges
            .get(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))
    }

    /// Copy the current value of every series, ordered by metric name.
    ///
    /// Each series is read atomically on its own; the snapshot as a whole is
    /// not linearizable with writes that land while it is being taken.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let counters = self.counters.values().map(|(def, c)| MetricSnapshot {
            def: def.clone(),
            values: SeriesValues::Counter(c.get_all()),
        });
        let gauges = self.gauges.values().map(|(def, g)| MetricSnapshot {
            def: def.clone(),
            values: SeriesValues::Gauge(g.get_all()),
        });
        let histograms = self.histograms.values().map(|(def, h)| MetricSnapshot {
            def: def.clone(),
            values: SeriesValues::Histogram(h.get_all()),
        });

        let mut all: Vec<MetricSnapshot> = counters.chain(gauges).chain(histograms).collect();
        all.sort_by(|a, b| a.def.name.cmp(&b.def.name));
        all
    }
}

/// Builder for MetricRegistry.
#[derive(Debug, Default)]
pub struct MetricRegistryBuilder {
    app_name: Option<String>,
    counters: Vec<(String, Vec<String>, String)>,
    histograms: Vec<(String, Vec<String>, Vec<f64>, String)>,
    gauges: Vec<(String, Vec<String>, String)>,
    include_request_metrics: bool,
}

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

impl MetricRegistryBuilder {
    /// Set the application name (used as the `app` label).
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Add a counter metric.
    ///
    /// # Arguments
    ///
    /// * `name` - Metric name (e.g., `requests_total`)
    /// * `labels` - Label names (e.g., `["method", "status"]`)
    /// * `help` - Description of the metric
    pub fn counter(mut self, name: &str, labels: &[&str], help: &str) -> Self {
        self.counters
            .push((name.to_string(), owned(labels), help.to_string()));
        self
    }

    /// Add a histogram metric with fixed, strictly ascending bucket bounds.
    pub fn histogram(mut self, name: &str, labels: &[&str], buckets: &[f64], help: &str) -> Self {
        self.histograms.push((
            name.to_string(),
            owned(labels),
            buckets.to_vec(),
            help.to_string(),
        ));
        self
    }

    /// Add a gauge metric.
    pub fn gauge(mut self, name: &str, labels: &[&str], help: &str) -> Self {
        self.gauges
            .push((name.to_string(), owned(labels), help.to_string()));
        self
    }

    /// Include the standard request metrics.
    ///
    /// Adds:
    /// - `http_requests_total{method, route, status_code, app, country}` - Counter
    /// - `http_request_duration_seconds{method, route, status_code, app}` - Histogram
    /// - `http_requests_in_flight{app}` - Gauge
    /// - `http_errors_total{method, route, status_code, app, error_type}` - Counter
    /// - `user_actions_total{action, app}` - Counter
    pub fn with_request_metrics(mut self) -> Self {
        self.include_request_metrics = true;
        self
    }

    /// Build the MetricRegistry.
    pub fn build(mut self) -> Result<MetricRegistry, MetricsError> {
        if self.include_request_metrics {
            self = self
                .counter(
                    HTTP_REQUESTS_TOTAL,
                    &["method", "route", "status_code", "app", "country"],
                    "Total HTTP requests",
                )
                .histogram(
                    HTTP_REQUEST_DURATION_SECONDS,
                    &["method", "route", "status_code", "app"],
                    HTTP_DURATION_BUCKETS,
                    "HTTP request duration in seconds",
                )
                .gauge(
                    HTTP_REQUESTS_IN_FLIGHT,
                    &["app"],
                    "Number of HTTP requests currently being processed",
                )
                .counter(
                    HTTP_ERRORS_TOTAL,
                    &["method", "route", "status_code", "app", "error_type"],
                    "Total HTTP errors",
                )
                .counter(
                    USER_ACTIONS_TOTAL,
                    &["action", "app"],
                    "Total user actions (logins, signups, etc.)",
                );
        }

        let app_name = self.app_name.unwrap_or_else(|| "app".to_string());
        let mut seen = BTreeSet::new();
        let mut claim = |name: &str| {
            if seen.insert(name.to_string()) {
                Ok(())
            } else {
                Err(MetricsError::DuplicateMetric(name.to_string()))
            }
        };

        let mut counters = BTreeMap::new();
        for (name, labels, help) in self.counters {
            claim(&name)?;
            let def = MetricDef {
                name: name.clone(),
                help,
                labels,
                kind: MetricKind::Counter,
            };
            counters.insert(name, (def, LabeledCounter::new()));
        }

        let mut histograms = BTreeMap::new();
        for (name, labels, buckets, help) in self.histograms {
            claim(&name)?;
            if !valid_buckets(&buckets) {
                return Err(MetricsError::InvalidBuckets(name));
            }
            let def = MetricDef {
                name: name.clone(),
                help,
                labels,
                kind: MetricKind::Histogram,
            };
            histograms.insert(name, (def, Histogram::new(&buckets)));
        }

        let mut gauges = BTreeMap::new();
        for (name, labels, help) in self.gauges {
            claim(&name)?;
            let def = MetricDef {
                name: name.clone(),
                help,
                labels,
                kind: MetricKind::Gauge,
            };
            gauges.insert(name, (def, Gauge::new()));
        }

        Ok(MetricRegistry {
            app_name,
            counters,
            histograms,
            gauges,
        })
    }
}

fn valid_buckets(buckets: &[f64]) -> bool {
    !buckets.is_empty()
        && buckets.iter().all(|b| b.is_finite())
        && buckets.windows(2).all(|w| w[0] < w[1])
}

/// Error class for a response status, if it is an error at all.
pub fn error_type(status: u16) -> Option<&'static str> {
    match status {
        500.. => Some("server_error"),
        400..=499 => Some("client_error"),
        _ => None,
    }
}

/// Labels describing one completed request.
///
/// All values must already be normalized to bounded domains.
#[derive(Debug, Clone, Copy)]
pub struct RequestLabels<'a> {
    /// Normalized method
    pub method: &'a str,
    /// Normalized route
    pub route: &'a str,
    /// Response status
    pub status: u16,
    /// Normalized country code
    pub country: &'a str,
}

/// Handle to a MetricRegistry for use in middleware and handlers.
///
/// A thin wrapper around `Arc<MetricRegistry>` with the request-level
/// recording operations. Recording never fails from the caller's point of
/// view: a registry without the request metrics just drops the update.
#[derive(Clone, Debug)]
pub struct TelemetryMetrics {
    registry: Arc<MetricRegistry>,
}

impl TelemetryMetrics {
    /// Create a new handle from a registry.
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Shared pointer to the underlying registry.
    pub fn shared(&self) -> Arc<MetricRegistry> {
        self.registry.clone()
    }

    /// Record a completed HTTP request.
    ///
    /// Updates `http_requests_total`, `http_request_duration_seconds` and,
    /// for status >= 400, `http_errors_total`.
    pub fn record_request(&self, labels: RequestLabels<'_>, duration_secs: f64) {
        let app = self.registry.app_name();
        let status = labels.status.to_string();

        self.report(self.registry.increment_counter(
            HTTP_REQUESTS_TOTAL,
            &[
                ("method", labels.method),
                ("route", labels.route),
                ("status_code", status.as_str()),
                ("app", app),
                ("country", labels.country),
            ],
        ));

        self.report(self.registry.observe_histogram(
            HTTP_REQUEST_DURATION_SECONDS,
            &[
                ("method", labels.method),
                ("route", labels.route),
                ("status_code", status.as_str()),
                ("app", app),
            ],
            duration_secs,
        ));

        if let Some(error_type) = error_type(labels.status) {
            self.report(self.registry.increment_counter(
                HTTP_ERRORS_TOTAL,
                &[
                    ("method", labels.method),
                    ("route", labels.route),
                    ("status_code", status.as_str()),
                    ("app", app),
                    ("error_type", error_type),
                ],
            ));
        }
    }

    /// Increment in-flight requests.
    pub fn inc_in_flight(&self) {
        let app = self.registry.app_name();
        self.report(self.registry.inc_gauge(HTTP_REQUESTS_IN_FLIGHT, &[("app", app)]));
    }

    /// Decrement in-flight requests.
    pub fn dec_in_flight(&self) {
        let app = self.registry.app_name();
        self.report(self.registry.dec_gauge(HTTP_REQUESTS_IN_FLIGHT, &[("app", app)]));
    }

    /// Current in-flight count for this registry's app.
    pub fn in_flight(&self) -> i64 {
        let labels = render_labels(&[("app", self.registry.app_name())]);
        self.registry
            .gauge(HTTP_REQUESTS_IN_FLIGHT)
            .map(|g| g.get(&labels))
            .unwrap_or(0)
    }

    /// Count an application-level event (login, signup, purchase...).
    ///
    /// `action` becomes a label value, so it must come from a fixed set
    /// chosen by the application, never from user input.
    pub fn record_user_action(&self, action: &str, app: &str) {
        self.report(
            self.registry
                .increment_counter(USER_ACTIONS_TOTAL, &[("action", action), ("app", app)]),
        );
    }

    fn report(&self, result: Result<(), MetricsError>) {
        if let Err(error) = result {
            tracing::debug!(%error, "Metric update dropped");
        }
    }
}

impl From<Arc<MetricRegistry>> for TelemetryMetrics {
    fn from(registry: Arc<MetricRegistry>) -> Self {
        Self::new(registry)
    }
}
