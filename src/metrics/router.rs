//! TelemetryRouter trait for Axum integration
//!
//! Extension trait that adds request telemetry to any Axum router.

use super::middleware::{metrics_handler, telemetry_middleware, Telemetry};
use axum::{middleware, routing::get, Router};

/// Extension trait for adding telemetry to an Axum Router.
///
/// # Example
///
/// ```ignore
/// use axum::{routing::get, Router};
/// use lantern::{Telemetry, TelemetryConfig, TelemetryRouter};
///
/// async fn handler() -> &'static str { "Hello" }
///
/// let telemetry = Telemetry::new(&TelemetryConfig::from_env())?;
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .with_telemetry(telemetry);
///
/// // Now the router has:
/// // - request metrics and one log record per request
/// // - GET /metrics for Prometheus
/// // - GET /health, unless a /health route was already defined
/// ```
pub trait TelemetryRouter {
    /// Add the metrics endpoint and the telemetry middleware.
    ///
    /// Call after every route (and fallback) is registered: routes added
    /// later are not instrumented. The router must not already define the
    /// configured metrics path.
    fn with_telemetry(self, telemetry: Telemetry) -> Self;
}

impl<S> TelemetryRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_telemetry(self, telemetry: Telemetry) -> Self {
        let for_handler = telemetry.clone();
        let metrics_path = telemetry.metrics_path().to_string();

        self.route(
            &metrics_path,
            get(move || metrics_handler(for_handler.clone())),
        )
        .layer(middleware::from_fn(move |req, next| {
            telemetry_middleware(telemetry.clone(), req, next)
        }))
    }
}
