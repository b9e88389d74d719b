//! Telemetry configuration
//!
//! Built from environment variables or programmatically through the
//! builder. Both paths produce a [`TelemetryConfig`] that is handed to
//! [`Telemetry::new`](crate::Telemetry::new) and [`logging::init`](crate::logging::init).

use std::time::Duration;

use crate::anonymize::DEFAULT_IP_SALT;
use crate::parse::parse_duration;

/// Default application label.
pub const DEFAULT_APP_NAME: &str = "axum-app";

/// Default timeout for upstream probes.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (default)
    #[default]
    Json,
    /// Human-readable format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Complete telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Value of the `app` label on every metric and log record
    pub app_name: String,
    /// Salt mixed into client address hashes
    pub ip_salt: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Log level filter (e.g., "info", "lantern=debug,tower_http=info")
    pub log_filter: String,
    /// Path of the scrape endpoint
    pub metrics_path: String,
    /// Path of the health endpoint (served only if the host has no route there)
    pub health_path: String,
    /// Base URL of an aggregation backend to probe from the health endpoint
    pub upstream_url: Option<String>,
    /// Timeout for each upstream probe
    pub upstream_timeout: Duration,
    default_salt: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            ip_salt: DEFAULT_IP_SALT.to_string(),
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            metrics_path: "/metrics".to_string(),
            health_path: "/health".to_string(),
            upstream_url: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            default_salt: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `APP_NAME`: application label (default: "axum-app")
    /// - `IP_SALT`: salt for client address hashing (default: insecure built-in literal)
    /// - `LOG_FORMAT`: "json", "pretty" or "compact" (default: "json")
    /// - `RUST_LOG`: log filter directive (default: "info")
    /// - `METRICS_PATH`: scrape endpoint path (default: "/metrics")
    /// - `HEALTH_PATH`: health endpoint path (default: "/health")
    /// - `UPSTREAM_METRICS_URL`: aggregation backend to probe (default: unset)
    /// - `UPSTREAM_TIMEOUT`: probe timeout, e.g. "5s", "500ms" (default: "5s")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key/value source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let (ip_salt, default_salt) = match get("IP_SALT") {
            Some(salt) => (salt, false),
            None => (defaults.ip_salt, true),
        };

        let upstream_timeout = match get("UPSTREAM_TIMEOUT") {
            Some(raw) => parse_duration(&raw).unwrap_or_else(|| {
                eprintln!(
                    "Warning: invalid UPSTREAM_TIMEOUT {raw:?}, using {}s",
                    DEFAULT_UPSTREAM_TIMEOUT.as_secs()
                );
                DEFAULT_UPSTREAM_TIMEOUT
            }),
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };

        Self {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            ip_salt,
            log_format: get("LOG_FORMAT")
                .and_then(|s| LogFormat::from_str_loose(&s))
                .unwrap_or_default(),
            log_filter: get("RUST_LOG").unwrap_or(defaults.log_filter),
            metrics_path: get("METRICS_PATH").unwrap_or(defaults.metrics_path),
            health_path: get("HEALTH_PATH").unwrap_or(defaults.health_path),
            upstream_url: get("UPSTREAM_METRICS_URL"),
            upstream_timeout,
            default_salt,
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Whether the built-in salt is in use.
    ///
    /// Address tokens made with it can be reversed by anyone who reads this
    /// crate, so production deployments must set `IP_SALT`.
    pub fn uses_default_salt(&self) -> bool {
        self.default_salt
    }
}

/// Builder for TelemetryConfig
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Set the application label.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Set the address hashing salt.
    pub fn ip_salt(mut self, salt: impl Into<String>) -> Self {
        self.config.ip_salt = salt.into();
        self.config.default_salt = false;
        self
    }

    /// Set the log format.
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.log_format = format;
        self
    }

    /// Set the log filter.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    /// Set the scrape endpoint path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.config.metrics_path = path.into();
        self
    }

    /// Set the health endpoint path.
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    /// Probe an aggregation backend from the health endpoint.
    pub fn upstream(mut self, url: impl Into<String>) -> Self {
        self.config.upstream_url = Some(url.into());
        self
    }

    /// Set the upstream probe timeout.
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.config.upstream_timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}
