//! Structured request logging
//!
//! One [`LogRecord`] per completed request, handed to a [`LogSink`] and then
//! dropped. The default sink turns it into a `tracing` event; with the JSON
//! subscriber installed by [`init`] that is one JSON object per line.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig};
use crate::error::TelemetryError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_filter`. Fails if a global
/// subscriber is already set.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| TelemetryError::Config(format!("Invalid log filter: {}", e)))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Json => subscriber
            .with(
                tracing_fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                tracing_fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(tracing_fmt::layer().compact().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::Logging(format!("Failed to init tracing: {}", e)))
}

/// Severity of a request log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Status below 400
    Info,
    /// Client errors (400-499)
    Warn,
    /// Server errors (500 and up)
    Error,
}

impl Severity {
    /// Severity for a response status.
    pub fn for_status(status: u16) -> Self {
        match status {
            500.. => Self::Error,
            400..=499 => Self::Warn,
            _ => Self::Info,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed request.
///
/// Carries no raw client address: only the anonymized `ip_hash`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Completion time, ISO-8601 UTC
    pub timestamp: String,
    /// Severity derived from `status`
    pub log_level: Severity,
    /// Application label
    pub app: String,
    /// Normalized request method
    pub method: String,
    /// Raw request path
    pub path: String,
    /// Normalized route label
    pub route: String,
    /// Response status
    pub status: u16,
    /// Duration in milliseconds, two decimals
    pub duration_ms: f64,
    /// Anonymized client address
    pub ip_hash: String,
    /// Country code or `unknown`
    pub country: String,
    /// Browser family
    pub browser: String,
    /// OS family
    pub os: String,
    /// Referrer or `direct`
    pub referer: String,
}

/// Destination for request log records.
///
/// Called once per request from the completion hook, possibly from many
/// tasks at once. Implementations must not block for long and must not
/// panic.
pub trait LogSink: Send + Sync + 'static {
    /// Emit one record.
    fn emit(&self, record: &LogRecord);
}

/// Emit a record as a `tracing` event at the given level.
///
/// `timestamp` is left to the formatter, which writes its own.
macro_rules! request_event {
    ($level:ident, $record:expr) => {{
        let r = $record;
        ::tracing::$level!(
            target: "lantern::request",
            log_level = r.log_level.as_str(),
            app = %r.app,
            method = %r.method,
            path = %r.path,
            route = %r.route,
            status = r.status,
            duration_ms = r.duration_ms,
            ip_hash = %r.ip_hash,
            country = %r.country,
            browser = %r.browser,
            os = %r.os,
            referer = %r.referer,
            "HTTP request"
        );
    }};
}

/// Default sink: one `tracing` event per record, at the record's severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        match record.log_level {
            Severity::Error => request_event!(error, record),
            Severity::Warn => request_event!(warn, record),
            Severity::Info => request_event!(info, record),
        }
    }
}

/// Current time as ISO-8601 UTC with second precision (`2026-01-01T00:00:00Z`).
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Round a duration in seconds to milliseconds with two decimals.
pub fn duration_ms(secs: f64) -> f64 {
    (secs * 100_000.0).round() / 100.0
}
