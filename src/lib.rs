//! # Lantern
//!
//! Privacy-aware request telemetry for Axum applications.
//!
//! One middleware layer gives every request:
//!
//! - **Metrics**: request counts, durations, errors and in-flight requests in
//!   a process-wide registry, scraped in Prometheus text format
//! - **Structured Logs**: one JSON record per request via `tracing`
//! - **Anonymized Clients**: addresses reduced to a salted 16-hex token
//! - **Client Buckets**: coarse browser/OS classification from `User-Agent`
//! - **Health**: a `/health` endpoint with optional upstream probes
//!
//! Label values pass through normalizers before reaching the registry.
//! Method, country and matched routes have bounded domains. Requests no
//! route matched are labeled by their path with numeric and UUID segments
//! collapsed to `:id`, so other distinct unknown paths (scanners, typos)
//! each add a series.
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use lantern::{logging, Telemetry, TelemetryConfig, TelemetryRouter};
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TelemetryConfig::from_env();
//!     logging::init(&config)?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello" }))
//!         .with_telemetry(Telemetry::new(&config)?);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Set `IP_SALT`. Without it a built-in salt is used, logged as a warning at
//! startup, and client tokens can be reversed by anyone reading this source.

pub mod anonymize;
pub mod classify;
mod config;
mod error;
pub mod health;
pub mod logging;
pub mod metrics;
mod parse;

// Re-exports
pub use config::{LogFormat, TelemetryConfig, TelemetryConfigBuilder, DEFAULT_APP_NAME, DEFAULT_UPSTREAM_TIMEOUT};
pub use error::{MetricsError, TelemetryError};
pub use metrics::{
    telemetry_middleware, MetricRegistry, Telemetry, TelemetryBuilder, TelemetryMetrics,
    TelemetryRouter,
};
pub use parse::parse_duration;
