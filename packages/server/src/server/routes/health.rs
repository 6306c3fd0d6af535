use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::tracking::EventKind;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    queue: QueueHealth,
    jobs: usize,
    stream_listeners: usize,
}

#[derive(Serialize)]
pub struct QueueHealth {
    status: String,
}

/// Health check endpoint
///
/// Reports queue availability, retained job count, and live stream listener
/// count. Always 200: a missing queue is a degraded-but-serving state (status
/// queries and streams still work).
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let deps = &state.deps;

    let queue = QueueHealth {
        status: if deps.dispatcher.is_available() {
            "ok".to_string()
        } else {
            "not_configured".to_string()
        },
    };

    let stream_listeners = EventKind::ALL
        .iter()
        .map(|k| deps.bus.listener_count(*k))
        .max()
        .unwrap_or(0);

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            queue,
            jobs: deps.tracker.len(),
            stream_listeners,
        }),
    )
}
