//! Demo host application with request telemetry.
//!
//! ```text
//! IP_SALT=dev-salt LOG_FORMAT=pretty cargo run --bin demo_server
//! curl localhost:3000/users/42
//! curl localhost:3000/boom
//! curl localhost:3000/metrics
//! ```
//!
//! `BIND_ADDR` overrides the listen address (default `127.0.0.1:3000`).

use std::net::SocketAddr;

use axum::{extract::Path, http::StatusCode, routing::get, Router};
use lantern::{logging, Telemetry, TelemetryConfig, TelemetryRouter};
use tower_http::catch_panic::CatchPanicLayer;

async fn index() -> &'static str {
    "Hello from lantern"
}

async fn user(Path(id): Path<u64>) -> String {
    format!("user {id}")
}

async fn fail() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn boom() -> &'static str {
    panic!("demo handler failure")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TelemetryConfig::from_env();
    logging::init(&config)?;

    let telemetry = Telemetry::new(&config)?;
    telemetry.record_user_action("startup");

    // CatchPanicLayer sits outside the telemetry layer so the failure is
    // recorded before the client gets its 500.
    let app = Router::new()
        .route("/", get(index))
        .route("/users/{id}", get(user))
        .route("/fail", get(fail))
        .route("/boom", get(boom))
        .with_telemetry(telemetry)
        .layer(CatchPanicLayer::new());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, app = %config.app_name, "Demo server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
