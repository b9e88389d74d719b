//! Request Metrics Infrastructure
//!
//! Provides the metrics half of the telemetry middleware for Axum:
//! - Counters, histograms, and gauges keyed by bounded label sets
//! - Per-request instrumentation with a drop guard
//! - Prometheus text format export
//! - `/metrics` endpoint for scraping
//!
//! # Quick Start
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use lantern::{Telemetry, TelemetryConfig, TelemetryRouter};
//!
//! let telemetry = Telemetry::new(&TelemetryConfig::from_env())?;
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .with_telemetry(telemetry.clone());
//!
//! // Business events, from a fixed set of names:
//! telemetry.record_user_action("signup");
//! ```
//!
//! # Request Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | Counter | method, route, status_code, app, country |
//! | `http_request_duration_seconds` | Histogram | method, route, status_code, app |
//! | `http_requests_in_flight` | Gauge | app |
//! | `http_errors_total` | Counter | method, route, status_code, app, error_type |
//! | `user_actions_total` | Counter | action, app |
//!
//! # Route Normalization
//!
//! The matched route pattern is used when axum provides one. Otherwise
//! dynamic path segments (UUIDs, numeric IDs) are normalized to `:id`:
//! - `/api/jobs/550e8400-e29b-41d4-a716-446655440000` → `/api/jobs/:id`
//! - `/users/12345/profile` → `/users/:id/profile`

mod middleware;
mod normalize;
mod prometheus;
mod registry;
mod router;
mod types;

// Core types
pub use registry::{
    error_type, MetricDef, MetricKind, MetricRegistry, MetricRegistryBuilder, MetricSnapshot,
    RequestLabels, SeriesValues, TelemetryMetrics,
};
pub use types::{render_labels, Gauge, Histogram, HistogramData, LabeledCounter};

// Metric names and bucket bounds
pub use registry::{
    HTTP_ERRORS_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION_SECONDS, USER_ACTIONS_TOTAL,
};
pub use types::HTTP_DURATION_BUCKETS;

// Label normalization
pub use normalize::{normalize_country, normalize_method, normalize_path, normalize_route, ID_PLACEHOLDER};

// Prometheus export
pub use prometheus::{export_prometheus, PrometheusExport, CONTENT_TYPE};

// Middleware and router
pub use middleware::{
    metrics_handler, telemetry_middleware, ClientDetails, RequestContext, Telemetry, TelemetryBuilder,
    CLIENT_IP_HEADER, COUNTRY_HEADER, STATUS_CLIENT_CLOSED, STATUS_PANIC,
};
pub use router::TelemetryRouter;
