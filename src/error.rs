//! Error types
//!
//! Telemetry errors never reach the client: the request interceptor logs
//! them and falls back to whatever it can still record. They surface only
//! from setup-time calls (registry construction, logging initialization)
//! and from the registry API when it is used directly.

use thiserror::Error;

/// Errors raised by the metrics registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    /// No metric with this name was registered.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Label names do not match the registered definition.
    #[error("label mismatch for {metric}: expected {expected:?}, got {got:?}")]
    LabelMismatch {
        /// Metric name
        metric: String,
        /// Declared label names, in order
        expected: Vec<String>,
        /// Label names supplied by the caller
        got: Vec<String>,
    },

    /// Histogram bucket bounds are empty, non-finite, or not strictly ascending.
    #[error("invalid histogram buckets for {0}")]
    InvalidBuckets(String),

    /// The same metric name was registered twice.
    #[error("metric registered twice: {0}")]
    DuplicateMetric(String),
}

/// Top-level telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Invalid configuration value
    #[error("telemetry config error: {0}")]
    Config(String),

    /// Logging subscriber could not be installed
    #[error("logging error: {0}")]
    Logging(String),

    /// Metrics registry error
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Upstream aggregation backend could not be reached
    #[error("upstream error: {0}")]
    Upstream(String),
}
