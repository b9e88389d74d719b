//! Health endpoint and upstream probes
//!
//! The health response is cheap and always answers 200: it says the process
//! is alive. Optional probes (an upstream metrics backend, for example) add a
//! `checks` map and downgrade the status to `degraded`, never to an error
//! status, so a flaky dependency cannot take the host out of rotation.
//!
//! # Usage
//!
//! ```ignore
//! use lantern::health::{upstream_check, HealthChecker};
//! use std::time::Duration;
//!
//! let checker = HealthChecker::new()
//!     .with_check(upstream_check("http://prometheus:9090", Duration::from_secs(5))?);
//!
//! let response = checker.report("my-app").await;
//! println!("{}", response.status);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_UPSTREAM_TIMEOUT;
use crate::error::TelemetryError;
use crate::logging;

/// Overall health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Every probe succeeded, or none are configured
    Healthy,
    /// At least one probe failed or timed out
    Degraded,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        })
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Connected,
    Disconnected,
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: HealthState,
    pub app: String,
    /// ISO-8601 UTC
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<BTreeMap<String, ProbeStatus>>,
}

/// Type alias for async probe functions
pub type CheckFn = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), TelemetryError>> + Send>> + Send + Sync,
>;

/// A named probe with its own timeout.
#[derive(Clone)]
pub struct HealthCheck {
    name: String,
    timeout: Duration,
    check_fn: CheckFn,
}

impl HealthCheck {
    /// Create a probe with the default upstream timeout.
    pub fn new<F, Fut>(name: impl Into<String>, check_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TelemetryError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            check_fn: Arc::new(move || Box::pin(check_fn())),
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the probe. Errors and timeouts both map to `Disconnected`.
    pub async fn run(&self) -> ProbeStatus {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, (self.check_fn)()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(check = %self.name, duration_ms, "Health check passed");
                ProbeStatus::Connected
            }
            Ok(Err(error)) => {
                tracing::warn!(check = %self.name, %error, duration_ms, "Health check failed");
                ProbeStatus::Disconnected
            }
            Err(_) => {
                tracing::warn!(
                    check = %self.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Health check timed out"
                );
                ProbeStatus::Disconnected
            }
        }
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Set of probes reported by the health endpoint.
#[derive(Debug, Clone, Default)]
pub struct HealthChecker {
    checks: Vec<HealthCheck>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a health check
    pub fn add_check(&mut self, check: HealthCheck) {
        self.checks.push(check);
    }

    /// Add a health check (builder pattern)
    pub fn with_check(mut self, check: HealthCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Run every probe in registration order.
    pub async fn check_all(&self) -> BTreeMap<String, ProbeStatus> {
        let mut results = BTreeMap::new();
        for check in &self.checks {
            results.insert(check.name.clone(), check.run().await);
        }
        results
    }

    /// Build the health response for `app`.
    ///
    /// Without probes this does no I/O and omits `checks`.
    pub async fn report(&self, app: &str) -> HealthResponse {
        let checks = if self.checks.is_empty() {
            None
        } else {
            Some(self.check_all().await)
        };

        let status = match &checks {
            Some(results) if results.values().any(|s| *s == ProbeStatus::Disconnected) => {
                HealthState::Degraded
            }
            _ => HealthState::Healthy,
        };

        HealthResponse {
            status,
            app: app.to_string(),
            timestamp: logging::timestamp(),
            checks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryReply {
    status: String,
}

/// Probe a Prometheus-compatible backend with the query `up`.
///
/// Passes when the backend answers 2xx with a JSON body whose `status` is
/// `"success"`.
pub fn upstream_check(url: impl Into<String>, timeout: Duration) -> Result<HealthCheck, TelemetryError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TelemetryError::Upstream(format!("Failed to build HTTP client: {}", e)))?;
    let endpoint = format!("{}/api/v1/query?query=up", url.into().trim_end_matches('/'));

    let check = HealthCheck::new("upstream", move || {
        let client = client.clone();
        let endpoint = endpoint.clone();
        async move { query_up(&client, &endpoint).await }
    });
    Ok(check.with_timeout(timeout))
}

async fn query_up(client: &reqwest::Client, endpoint: &str) -> Result<(), TelemetryError> {
    let response = client
        .get(endpoint)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| TelemetryError::Upstream(e.to_string()))?;

    let reply: QueryReply = response
        .json()
        .await
        .map_err(|e| TelemetryError::Upstream(format!("Invalid response: {}", e)))?;

    if reply.status == "success" {
        Ok(())
    } else {
        Err(TelemetryError::Upstream(format!("Query status: {}", reply.status)))
    }
}
