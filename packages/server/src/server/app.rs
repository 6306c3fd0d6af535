//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    check_rank, get_job_status, health_handler, report_progress, start_blog_tracking,
    start_smartplace_tracking, stream_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router
///
/// The tracking registries arrive via [`ServerDeps`] rather than ambient
/// globals, so tests wire their own instances (and a queue fake) in place.
pub fn build_app(deps: Arc<ServerDeps>) -> Router {
    let app_state = AppState { deps };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/api/tracking/blog", post(start_blog_tracking))
        .route("/api/tracking/smartplace", post(start_smartplace_tracking))
        .route("/api/tracking/check", post(check_rank))
        .route("/api/tracking/jobs/:job_id", get(get_job_status))
        .route("/api/tracking/jobs/:job_id/progress", post(report_progress))
        .route("/api/tracking/stream", get(stream_handler))
        .route("/health", get(health_handler))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
