//! Read-only HTTP status surface.
//!
//! - `GET /api/status` : controller snapshot, publisher state and recent log lines
//! - `GET /health`     : liveness check for container orchestration

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::core::fan_control::store::{RuntimeSnapshot, RuntimeStore};
use crate::error::{FanError, Result};
use crate::logging::LogBuffer;

/// Number of log lines returned by `/api/status`.
pub const STATUS_LOG_LINES: usize = 120;

#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<RuntimeStore>,
    pub logs: LogBuffer,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub snapshot: RuntimeSnapshot,
    pub updated_at_human: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: StatusView,
    pub mqtt_connected: bool,
    pub log_text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Assemble the `/api/status` body from the current state.
pub fn status_response(state: &StatusState) -> StatusResponse {
    let snapshot = state.store.read();
    let updated_at_human = human_timestamp(snapshot.updated_at);
    let mqtt_connected = snapshot.publisher_connected;

    StatusResponse {
        status: StatusView {
            snapshot,
            updated_at_human,
        },
        mqtt_connected,
        log_text: state.logs.tail(STATUS_LOG_LINES).join("\n"),
    }
}

/// Local time with a `UTC±h` suffix, or `"None"` when unset.
pub fn human_timestamp(ts: Option<i64>) -> String {
    let Some(ts) = ts.filter(|ts| *ts != 0) else {
        return "None".to_string();
    };
    let Some(utc) = chrono::DateTime::from_timestamp(ts, 0) else {
        return ts.to_string();
    };

    let local = utc.with_timezone(&chrono::Local);
    let hours = local.offset().local_minus_utc() / 3600;
    let zone = if hours == 0 {
        "UTC".to_string()
    } else {
        format!("UTC{:+}", hours)
    };

    format!("{} ({})", local.format("%Y-%m-%d %H:%M:%S"), zone)
}

async fn status_handler(State(state): State<StatusState>) -> Json<StatusResponse> {
    Json(status_response(&state))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve the status API on `bind` until shutdown.
pub async fn run_server(
    bind: &str,
    state: StatusState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| FanError::server(format!("cannot bind {}: {}", bind, e)))?;

    log::info!("Status API listening on http://{}/api/status", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| FanError::server(e.to_string()))
}
