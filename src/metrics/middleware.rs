//! Request telemetry middleware for Axum
//!
//! One [`RequestContext`] per request brackets the handler:
//! - on start it derives every label and increments `http_requests_in_flight`
//! - on completion it records `http_requests_total`,
//!   `http_request_duration_seconds`, `http_errors_total` (status >= 400),
//!   decrements the gauge and emits one [`LogRecord`]
//!
//! Completion runs from `Drop` when the handler never returned a response,
//! so a panicking handler is recorded as 500 and a cancelled request (timeout,
//! client gone) as 499. The in-flight gauge cannot leak.
//!
//! # Label cardinality
//!
//! Every label value derived from a request goes through a normalizer
//! ([`normalize_route`], [`normalize_method`], [`normalize_country`]).
//! Method and country have fixed domains, and so does the route of any
//! request the router matched. A request with no match is labeled by
//! [`normalize_path`](super::normalize_path) of its raw path: numeric and
//! UUID segments collapse, other segments do not, so each distinct unknown
//! path (scanners, typos) adds a series that lives until restart. A new
//! label must have a bounded domain; addresses and free-form header values
//! must never become label values.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::normalize::{normalize_country, normalize_method, normalize_route};
use super::prometheus::{PrometheusExport, CONTENT_TYPE};
use super::registry::{MetricRegistry, RequestLabels, TelemetryMetrics};
use crate::anonymize::anonymize_ip;
use crate::classify::{classify_user_agent, ClientInfo};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::health::{upstream_check, HealthCheck, HealthChecker, HealthResponse};
use crate::logging::{self, LogRecord, LogSink, Severity, TracingSink};

/// Trusted-proxy header carrying the original client address.
pub const CLIENT_IP_HEADER: &str = "cf-connecting-ip";

/// Proxy header carrying the client's country code.
pub const COUNTRY_HEADER: &str = "cf-ipcountry";

/// Status recorded when a request future is dropped before completing.
pub const STATUS_CLIENT_CLOSED: u16 = 499;

/// Status recorded when the handler panicked.
pub const STATUS_PANIC: u16 = 500;

/// Shared telemetry state handed to the middleware and the `/metrics` handler.
///
/// Cheap to clone. Immutable once built: every clone sees the same sink,
/// registry and health checks.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    metrics: TelemetryMetrics,
    salt: String,
    sink: Arc<dyn LogSink>,
    health: HealthChecker,
    metrics_path: String,
    health_path: String,
}

impl Telemetry {
    /// Build telemetry state with a fresh request registry and the
    /// `tracing` log sink.
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        Self::builder(config).build()
    }

    /// Create a builder for custom sinks, registries or health checks.
    pub fn builder(config: &TelemetryConfig) -> TelemetryBuilder {
        TelemetryBuilder {
            config: config.clone(),
            registry: None,
            sink: Arc::new(TracingSink),
            checks: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &TelemetryMetrics {
        &self.inner.metrics
    }

    pub fn registry(&self) -> &MetricRegistry {
        self.inner.metrics.registry()
    }

    pub fn app_name(&self) -> &str {
        self.registry().app_name()
    }

    pub fn metrics_path(&self) -> &str {
        &self.inner.metrics_path
    }

    pub fn health_path(&self) -> &str {
        &self.inner.health_path
    }

    /// Count an application-level event for this app.
    ///
    /// `action` becomes a label value: pass names from a fixed set only.
    pub fn record_user_action(&self, action: &str) {
        self.inner.metrics.record_user_action(action, self.app_name());
    }

    /// Exposition body and content type.
    pub fn export(&self) -> (String, &'static str) {
        self.registry().export()
    }

    /// Health body, running any configured probes.
    pub async fn health(&self) -> HealthResponse {
        self.inner.health.report(self.app_name()).await
    }

    fn anonymize(&self, address: &str) -> String {
        anonymize_ip(address, &self.inner.salt)
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("app", &self.app_name())
            .field("metrics_path", &self.inner.metrics_path)
            .field("health_path", &self.inner.health_path)
            .field("health_checks", &self.inner.health.check_count())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Telemetry`].
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    registry: Option<Arc<MetricRegistry>>,
    sink: Arc<dyn LogSink>,
    checks: Vec<HealthCheck>,
}

impl TelemetryBuilder {
    /// Record into an existing registry instead of a fresh one.
    ///
    /// The registry's app name labels every series and log record. It should
    /// have been built with `with_request_metrics()`; updates to metrics it
    /// lacks are dropped.
    pub fn registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the log sink.
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Add a probe to the health endpoint.
    pub fn health_check(mut self, check: HealthCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Build the telemetry state.
    ///
    /// Logs a warning when the built-in anonymization salt is in use. Adds
    /// the upstream probe when `upstream_url` is configured.
    pub fn build(self) -> Result<Telemetry, TelemetryError> {
        let config = self.config;
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(MetricRegistry::for_requests(config.app_name.clone())?),
        };

        if config.uses_default_salt() {
            tracing::warn!(
                app = %registry.app_name(),
                "IP_SALT is not set; client address tokens use the built-in salt and can be reversed"
            );
        }

        let mut health = HealthChecker::new();
        if let Some(url) = &config.upstream_url {
            health.add_check(upstream_check(url.clone(), config.upstream_timeout)?);
        }
        for check in self.checks {
            health.add_check(check);
        }

        Ok(Telemetry {
            inner: Arc::new(TelemetryInner {
                metrics: TelemetryMetrics::new(registry),
                salt: config.ip_salt,
                sink: self.sink,
                health,
                metrics_path: config.metrics_path,
                health_path: config.health_path,
            }),
        })
    }
}

impl std::fmt::Debug for TelemetryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("checks", &self.checks)
            .finish_non_exhaustive()
    }
}

/// Client details derived from request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDetails {
    /// Proxy-supplied address, else transport address, else `unknown`
    pub address: String,
    /// Normalized country code
    pub country: String,
    /// Browser/OS buckets
    pub client: ClientInfo,
    /// `Referer`, then `Referrer`, else `direct`
    pub referer: String,
}

impl ClientDetails {
    /// Read client details from headers, falling back to the transport address.
    pub fn from_headers(headers: &HeaderMap, transport: Option<IpAddr>) -> Self {
        let address = header_value(headers, CLIENT_IP_HEADER)
            .map(str::to_string)
            .or_else(|| transport.map(|ip| ip.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let referer = header_value(headers, header::REFERER.as_str())
            .or_else(|| header_value(headers, "referrer"))
            .unwrap_or("direct")
            .to_string();

        Self {
            address,
            country: normalize_country(header_value(headers, COUNTRY_HEADER)),
            client: classify_user_agent(
                header_value(headers, header::USER_AGENT.as_str()).unwrap_or_default(),
            ),
            referer,
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Per-request telemetry state.
///
/// Created when the request enters the middleware, completed exactly once:
/// by [`finish`](Self::finish) or, failing that, by `Drop`.
pub struct RequestContext {
    telemetry: Telemetry,
    start: Instant,
    method: String,
    path: String,
    route: String,
    ip_hash: String,
    country: String,
    client: ClientInfo,
    referer: String,
    completed: bool,
}

impl RequestContext {
    /// Derive labels from the request and count it as in flight.
    pub fn start(telemetry: &Telemetry, request: &Request) -> Self {
        let path = request.uri().path();
        let matched = request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);
        let transport = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let details = ClientDetails::from_headers(request.headers(), transport);

        telemetry.metrics().inc_in_flight();

        Self {
            telemetry: telemetry.clone(),
            start: Instant::now(),
            method: normalize_method(request.method().as_str()).to_string(),
            path: path.to_string(),
            route: normalize_route(path, matched).into_owned(),
            ip_hash: telemetry.anonymize(&details.address),
            country: details.country,
            client: details.client,
            referer: details.referer,
            completed: false,
        }
    }

    /// Normalized route label.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Anonymized client token.
    pub fn ip_hash(&self) -> &str {
        &self.ip_hash
    }

    /// Record completion with the response status.
    pub fn finish(mut self, status: u16) {
        self.complete(status);
    }

    fn complete(&mut self, status: u16) {
        if self.completed {
            return;
        }
        self.completed = true;

        let elapsed = self.start.elapsed().as_secs_f64();
        let metrics = self.telemetry.metrics();

        metrics.dec_in_flight();
        metrics.record_request(
            RequestLabels {
                method: &self.method,
                route: &self.route,
                status,
                country: &self.country,
            },
            elapsed,
        );

        let record = LogRecord {
            timestamp: logging::timestamp(),
            log_level: Severity::for_status(status),
            app: self.telemetry.app_name().to_string(),
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            route: self.route.clone(),
            status,
            duration_ms: logging::duration_ms(elapsed),
            ip_hash: std::mem::take(&mut self.ip_hash),
            country: std::mem::take(&mut self.country),
            browser: self.client.browser.to_string(),
            os: self.client.os.to_string(),
            referer: std::mem::take(&mut self.referer),
        };
        self.telemetry.inner.sink.emit(&record);
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let status = if std::thread::panicking() {
            STATUS_PANIC
        } else {
            STATUS_CLIENT_CLOSED
        };
        self.complete(status);
    }
}

/// Middleware that records request telemetry.
///
/// Apply with `Router::layer` so routing has already run and the matched
/// route pattern is available. Also answers `GET <health_path>` when no host
/// route matched it.
///
/// # Example
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use lantern::{telemetry_middleware, Telemetry, TelemetryConfig};
///
/// let telemetry = Telemetry::new(&TelemetryConfig::from_env())?;
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn(move |req, next| {
///         telemetry_middleware(telemetry.clone(), req, next)
///     }));
/// ```
pub async fn telemetry_middleware(telemetry: Telemetry, request: Request, next: Next) -> Response {
    let context = RequestContext::start(&telemetry, &request);

    let response = if is_health_request(&telemetry, &request) {
        Json(telemetry.health().await).into_response()
    } else {
        next.run(request).await
    };

    context.finish(response.status().as_u16());
    response
}

fn is_health_request(telemetry: &Telemetry, request: &Request) -> bool {
    request.method() == Method::GET
        && request.uri().path() == telemetry.health_path()
        && request.extensions().get::<MatchedPath>().is_none()
}

/// Handler for the metrics endpoint.
pub async fn metrics_handler(telemetry: Telemetry) -> Response {
    let body = telemetry.registry().export_prometheus();
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::test_support::{with_captured_tracing, MemorySink};
    use crate::metrics::HTTP_REQUESTS_TOTAL;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::{middleware, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn config() -> TelemetryConfig {
        TelemetryConfig::builder().app_name("test").ip_salt("abc").build()
    }

    fn telemetry(sink: &MemorySink) -> Telemetry {
        Telemetry::builder(&config())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap()
    }

    fn salt_warnings(output: &str) -> usize {
        output
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .filter(|e| {
                e["level"] == "WARN"
                    && e["message"].as_str().is_some_and(|m| m.contains("IP_SALT"))
            })
            .count()
    }

    async fn boom() -> &'static str {
        panic!("handler failure")
    }

    fn app(telemetry: Telemetry) -> Router {
        let for_metrics = telemetry.clone();
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/users/{id}", get(|| async { "user" }))
            .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/boom", get(boom))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "late"
                }),
            )
            .route("/metrics", get(move || metrics_handler(for_metrics.clone())))
            .layer(middleware::from_fn(move |req, next| {
                telemetry_middleware(telemetry.clone(), req, next)
            }))
    }

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn request_from(uri: &str, addr: &str) -> Request {
        let mut req = request(uri);
        req.extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        req
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_scenario_and_scrape() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        for (uri, status) in [
            ("/", StatusCode::OK),
            ("/missing", StatusCode::NOT_FOUND),
            ("/fail", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let response = app.clone().oneshot(request(uri)).await.unwrap();
            assert_eq!(response.status(), status);
        }

        let response = app.clone().oneshot(request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
        let body = body_string(response).await;

        assert!(body.contains(
            "http_requests_total{method=\"GET\",route=\"/\",status_code=\"200\",app=\"test\",country=\"unknown\"} 1"
        ));
        assert!(body.contains(
            "http_requests_total{method=\"GET\",route=\"/missing\",status_code=\"404\",app=\"test\",country=\"unknown\"} 1"
        ));
        assert!(body.contains(
            "http_requests_total{method=\"GET\",route=\"/fail\",status_code=\"500\",app=\"test\",country=\"unknown\"} 1"
        ));
        assert!(body.contains(
            "http_errors_total{method=\"GET\",route=\"/missing\",status_code=\"404\",app=\"test\",error_type=\"client_error\"} 1"
        ));
        assert!(body.contains(
            "http_errors_total{method=\"GET\",route=\"/fail\",status_code=\"500\",app=\"test\",error_type=\"server_error\"} 1"
        ));
        assert!(!body.contains("http_errors_total{method=\"GET\",route=\"/\","));
        assert!(body.contains("http_requests_in_flight{app=\"test\"} 1"));

        // The scrape is logged too, after the three requests.
        let levels: Vec<Severity> = sink.records().iter().map(|r| r.log_level).collect();
        assert_eq!(
            levels,
            vec![Severity::Info, Severity::Warn, Severity::Error, Severity::Info]
        );
    }

    #[tokio::test]
    async fn test_matched_route_label() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        app.clone().oneshot(request("/users/42")).await.unwrap();
        app.oneshot(request("/users/7/posts/550e8400-e29b-41d4-a716-446655440000"))
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records[0].route, "/users/{id}");
        assert_eq!(records[0].path, "/users/42");
        assert_eq!(records[1].route, "/users/:id/posts/:id");
        assert_eq!(records[1].status, 404);
    }

    #[tokio::test]
    async fn test_transport_address_token_is_stable() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        for _ in 0..2 {
            app.clone()
                .oneshot(request_from("/", "203.0.113.5:51234"))
                .await
                .unwrap();
        }

        let records = sink.records();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.ip_hash, "bbe559046319537f");
            assert!(!record.ip_hash.contains("203.0.113.5"));
        }
    }

    #[tokio::test]
    async fn test_proxy_headers() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        let mut req = request_from("/", "203.0.113.5:51234");
        let headers = req.headers_mut();
        headers.insert(CLIENT_IP_HEADER, HeaderValue::from_static("198.51.100.7"));
        headers.insert(COUNTRY_HEADER, HeaderValue::from_static("de"));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0"),
        );
        headers.insert("referrer", HeaderValue::from_static("https://example.com/"));
        app.oneshot(req).await.unwrap();

        let record = &sink.records()[0];
        assert_eq!(record.ip_hash, anonymize_ip("198.51.100.7", "abc"));
        assert_eq!(record.country, "DE");
        assert_eq!(record.browser, "Firefox");
        assert_eq!(record.os, "Linux");
        assert_eq!(record.referer, "https://example.com/");
    }

    #[tokio::test]
    async fn test_missing_client_details() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        app.oneshot(request("/")).await.unwrap();

        let record = &sink.records()[0];
        assert_eq!(record.ip_hash, anonymize_ip("unknown", "abc"));
        assert_eq!(record.country, "unknown");
        assert_eq!(record.browser, "unknown");
        assert_eq!(record.os, "unknown");
        assert_eq!(record.referer, "direct");
    }

    #[tokio::test]
    async fn test_panicking_handler_is_recorded() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let app = app(telemetry.clone());

        let result = tokio::spawn(app.oneshot(request("/boom"))).await;
        assert!(result.unwrap_err().is_panic());

        assert_eq!(telemetry.metrics().in_flight(), 0);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 500);
        assert_eq!(records[0].log_level, Severity::Error);
        assert_eq!(records[0].route, "/boom");

        let body = telemetry.export().0;
        assert!(body.contains("error_type=\"server_error\"} 1"));
    }

    #[tokio::test]
    async fn test_cancelled_request_is_recorded() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let app = app(telemetry.clone());

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), app.oneshot(request("/slow"))).await;
        assert!(outcome.is_err());

        assert_eq!(telemetry.metrics().in_flight(), 0);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, STATUS_CLIENT_CLOSED);
        assert_eq!(records[0].log_level, Severity::Warn);
    }

    #[tokio::test]
    async fn test_health_answered_when_unrouted() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        let response = app.oneshot(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["app"], "test");
        assert!(json["timestamp"].is_string());

        assert_eq!(sink.records()[0].route, "/health");
        assert_eq!(sink.records()[0].status, 200);
    }

    #[tokio::test]
    async fn test_host_health_route_wins() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let app = Router::new()
            .route("/health", get(|| async { "host health" }))
            .layer(middleware::from_fn(move |req, next| {
                telemetry_middleware(telemetry.clone(), req, next)
            }));

        let response = app.oneshot(request("/health")).await.unwrap();
        assert_eq!(body_string(response).await, "host health");
    }

    #[tokio::test]
    async fn test_health_reports_degraded_probe() {
        let sink = MemorySink::default();
        let telemetry = Telemetry::builder(&config())
            .sink(Arc::new(sink.clone()))
            .health_check(HealthCheck::new("upstream", || async {
                Err(TelemetryError::Upstream("down".into()))
            }))
            .build()
            .unwrap();

        let response = app(telemetry).oneshot(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["checks"]["upstream"], "disconnected");
    }

    #[test]
    fn test_default_salt_warns_once() {
        let (telemetry, output) =
            with_captured_tracing(|| Telemetry::new(&TelemetryConfig::default()));
        assert!(telemetry.is_ok());
        assert_eq!(salt_warnings(&output), 1);
    }

    #[test]
    fn test_configured_salt_does_not_warn() {
        let (telemetry, output) = with_captured_tracing(|| Telemetry::new(&config()));
        assert!(telemetry.is_ok());
        assert_eq!(salt_warnings(&output), 0);
    }

    #[test]
    fn test_clones_share_sink() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let shared = telemetry.clone();

        let request = request("/");
        RequestContext::start(&shared, &request).finish(200);

        assert_eq!(sink.records().len(), 1);
        assert_eq!(telemetry.metrics().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unrouted_path_labels() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let app = app(telemetry.clone());

        for i in 0..20 {
            app.clone()
                .oneshot(request(&format!("/orders/{i}")))
                .await
                .unwrap();
        }
        for i in 0..5 {
            app.clone()
                .oneshot(request(&format!("/scan-{i:x}z")))
                .await
                .unwrap();
        }

        let series = telemetry
            .registry()
            .counter(HTTP_REQUESTS_TOTAL)
            .unwrap()
            .get_all();
        // Numeric segments collapse to one series; other unknown paths do not.
        assert_eq!(series.len(), 6);
        assert!(series
            .iter()
            .any(|(labels, count)| labels.contains("route=\"/orders/:id\"") && *count == 20));
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        let app = app(telemetry.clone());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(request(&format!("/users/{i}"))).await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().status(), StatusCode::OK);
        }

        assert_eq!(telemetry.metrics().in_flight(), 0);
        assert_eq!(sink.records().len(), 64);
        assert!(telemetry.export().0.contains(
            "http_requests_total{method=\"GET\",route=\"/users/{id}\",status_code=\"200\",app=\"test\",country=\"unknown\"} 64"
        ));
    }

    #[tokio::test]
    async fn test_nonstandard_method_label() {
        let sink = MemorySink::default();
        let app = app(telemetry(&sink));

        let req = Request::builder()
            .method(Method::from_bytes(b"PROPFIND").unwrap())
            .uri("/")
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap();

        assert_eq!(sink.records()[0].method, "OTHER");
    }

    #[test]
    fn test_client_details_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://a.example/"));
        headers.insert("referrer", HeaderValue::from_static("https://b.example/"));
        headers.insert(CLIENT_IP_HEADER, HeaderValue::from_static("  "));

        let details = ClientDetails::from_headers(&headers, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(details.address, "10.0.0.1");
        assert_eq!(details.referer, "https://a.example/");
    }

    #[test]
    fn test_user_action() {
        let sink = MemorySink::default();
        let telemetry = telemetry(&sink);
        telemetry.record_user_action("signup");
        telemetry.record_user_action("signup");

        assert!(telemetry
            .export()
            .0
            .contains("user_actions_total{action=\"signup\",app=\"test\"} 2"));
    }
}
