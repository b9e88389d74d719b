//! Prometheus text format export
//!
//! Serializes a [`MetricRegistry`] snapshot into the text exposition format.
//! Export is read-only and may run while requests are still recording.

use super::registry::{MetricRegistry, MetricSnapshot, SeriesValues};
use super::types::HistogramData;
use std::fmt::Write;

/// Media type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Export metrics in Prometheus text format.
///
/// Metrics are written in name order; metrics without any series are
/// skipped.
///
/// # Example Output
///
/// ```text
/// # HELP http_requests_total Total HTTP requests
/// # TYPE http_requests_total counter
/// http_requests_total{method="GET",route="/api",status_code="200",app="web",country="US"} 42
///
/// # HELP http_request_duration_seconds HTTP request duration in seconds
/// # TYPE http_request_duration_seconds histogram
/// http_request_duration_seconds_bucket{method="GET",route="/api",status_code="200",app="web",le="0.1"} 10
/// http_request_duration_seconds_bucket{method="GET",route="/api",status_code="200",app="web",le="+Inf"} 42
/// http_request_duration_seconds_sum{method="GET",route="/api",status_code="200",app="web"} 12.345
/// http_request_duration_seconds_count{method="GET",route="/api",status_code="200",app="web"} 42
/// ```
pub fn export_prometheus(registry: &MetricRegistry) -> String {
    let mut output = String::with_capacity(4096);
    for metric in registry.snapshot() {
        // Writing into a String cannot fail.
        let _ = write_metric(&mut output, &metric);
    }
    output
}

fn write_metric(output: &mut String, metric: &MetricSnapshot) -> std::fmt::Result {
    if metric.values.is_empty() {
        return Ok(());
    }

    let name = &metric.def.name;
    writeln!(output, "# HELP {name} {}", escape_help(&metric.def.help))?;
    writeln!(output, "# TYPE {name} {}", metric.def.kind)?;

    match &metric.values {
        SeriesValues::Counter(values) => {
            for (labels, value) in values {
                write_sample(output, name, labels, value)?;
            }
        }
        SeriesValues::Gauge(values) => {
            for (labels, value) in values {
                write_sample(output, name, labels, value)?;
            }
        }
        SeriesValues::Histogram(data) => {
            for hist in data {
                write_histogram(output, name, hist)?;
            }
        }
    }
    writeln!(output)
}

fn write_sample(
    output: &mut String,
    name: &str,
    labels: &str,
    value: impl std::fmt::Display,
) -> std::fmt::Result {
    if labels.is_empty() {
        writeln!(output, "{name} {value}")
    } else {
        writeln!(output, "{name}{{{labels}}} {value}")
    }
}

fn write_histogram(output: &mut String, name: &str, hist: &HistogramData) -> std::fmt::Result {
    let labels = &hist.labels;
    let sep = if labels.is_empty() { "" } else { "," };

    for (bound, count) in hist.buckets.iter().zip(&hist.counts) {
        let le = format_le(*bound);
        writeln!(output, "{name}_bucket{{{labels}{sep}le=\"{le}\"}} {count}")?;
    }
    writeln!(output, "{name}_bucket{{{labels}{sep}le=\"+Inf\"}} {}", hist.count)?;

    write_sample(output, &format!("{name}_sum"), labels, hist.sum)?;
    write_sample(output, &format!("{name}_count"), labels, hist.count)
}

/// Format a bucket boundary for Prometheus.
fn format_le(value: f64) -> String {
    if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == value.floor() && value.abs() < 1e10 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Extension trait for MetricRegistry to add prometheus export.
pub trait PrometheusExport {
    /// Export all metrics in Prometheus text format.
    fn export_prometheus(&self) -> String;

    /// Export body plus the `Content-Type` header value to serve it with.
    fn export(&self) -> (String, &'static str) {
        (self.export_prometheus(), CONTENT_TYPE)
    }
}

impl PrometheusExport for MetricRegistry {
    fn export_prometheus(&self) -> String {
        export_prometheus(self)
    }
}
