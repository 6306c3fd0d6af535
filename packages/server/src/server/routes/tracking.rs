//! Tracking endpoints.
//!
//! POST /api/tracking/blog              - dispatch a blog keyword backlog
//! POST /api/tracking/smartplace        - dispatch a smartplace keyword backlog
//! POST /api/tracking/check             - on-demand single-keyword rank check
//! GET  /api/tracking/jobs/{id}         - owner-checked job status query
//! POST /api/tracking/jobs/{id}/progress - worker progress/result callback
//!
//! The tracker itself is a passive store; these handlers own event
//! publication, choosing the payload shape per call site.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::kernel::tracking::{
    DispatchError, JobFailure, JobKind, JobPatch, JobStatus, NewJob, Progress, RankSnapshot,
    Target, TrackingEvent, TrackingMessage,
};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

const WORKER_TOKEN_HEADER: &str = "x-worker-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogKeyword {
    pub keyword_id: Uuid,
    pub keyword: String,
    pub blog_url: String,
    pub blog_name: String,
    pub project_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BlogTrackingRequest {
    pub keywords: Vec<BlogKeyword>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartplaceKeyword {
    pub keyword_id: Uuid,
    pub keyword: String,
    pub place_id: String,
    pub place_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SmartplaceTrackingRequest {
    pub keywords: Vec<SmartplaceKeyword>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub job_id: Uuid,
    pub queued: usize,
    pub estimated_seconds: u64,
}

/// Dispatch blog-keyword tracking for the authenticated owner.
pub async fn start_blog_tracking(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(request): Json<BlogTrackingRequest>,
) -> Result<Json<DispatchResponse>, (StatusCode, Json<serde_json::Value>)> {
    let now = Utc::now();
    let messages: Vec<TrackingMessage> = request
        .keywords
        .into_iter()
        .map(|k| TrackingMessage::Blog {
            keyword_id: k.keyword_id,
            keyword: k.keyword,
            user_id: user.user_id,
            blog_url: k.blog_url,
            blog_name: k.blog_name,
            project_id: k.project_id,
            timestamp: now,
        })
        .collect();

    run_dispatch(&state, &user, JobKind::Blog, messages).await
}

/// Dispatch smartplace-keyword tracking for the authenticated owner.
pub async fn start_smartplace_tracking(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(request): Json<SmartplaceTrackingRequest>,
) -> Result<Json<DispatchResponse>, (StatusCode, Json<serde_json::Value>)> {
    let now = Utc::now();
    let messages: Vec<TrackingMessage> = request
        .keywords
        .into_iter()
        .map(|k| TrackingMessage::Smartplace {
            keyword_id: k.keyword_id,
            keyword: k.keyword,
            user_id: user.user_id,
            place_id: k.place_id,
            place_name: k.place_name,
            timestamp: now,
        })
        .collect();

    run_dispatch(&state, &user, JobKind::Smartplace, messages).await
}

/// Register the aggregate job, hand the backlog to the queue, and publish
/// the resulting state changes.
async fn run_dispatch(
    state: &AppState,
    user: &AuthUser,
    kind: JobKind,
    messages: Vec<TrackingMessage>,
) -> Result<Json<DispatchResponse>, (StatusCode, Json<serde_json::Value>)> {
    let deps = &state.deps;

    // Refuse up front rather than degrade silently.
    if !deps.dispatcher.is_available() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "tracking queue is not configured" })),
        ));
    }
    if messages.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "keywords must not be empty" })),
        ));
    }

    let total = messages.len();
    let job = deps
        .tracker
        .add_job(
            NewJob::builder()
                .owner_id(user.user_id)
                .owner_name(user.name.clone())
                .owner_email(user.email.clone())
                .kind(kind)
                .total(total as u32)
                .build(),
        )
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        })?;
    deps.bus.emit(TrackingEvent::status(
        &job,
        Some(format!("queued {} keywords", total)),
    ));

    info!(job_id = %job.id, kind = kind.as_str(), keywords = total, "dispatching tracking batch");

    let report = match deps.dispatcher.dispatch(&messages).await {
        Ok(report) => report,
        Err(DispatchError::NotConfigured) => {
            // Availability can flip between the check and the send.
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "tracking queue is not configured" })),
            ));
        }
    };

    let updated = if report.all_sent() {
        // Handed off to external workers; their callbacks drive progress.
        deps.tracker.update_job(
            job.id,
            JobPatch::builder()
                .status(JobStatus::Processing)
                .progress(Progress::new(0, total as u32))
                .build(),
        )
    } else {
        let failure = JobFailure::now(format!(
            "{} of {} batches failed: {}",
            report.failures.len(),
            report.batches,
            report
                .failures
                .first()
                .map(|f| f.message.as_str())
                .unwrap_or("unknown error"),
        ));
        deps.tracker.update_job(
            job.id,
            JobPatch::builder()
                .status(JobStatus::Failed)
                .error(failure)
                .build(),
        )
    };

    if let Some(updated) = updated {
        deps.bus.emit(TrackingEvent::status(&updated, None));
        deps.bus.emit(TrackingEvent::JobUpdate {
            job: updated.clone(),
        });
        if updated.status == JobStatus::Failed {
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "tracking dispatch failed",
                    "jobId": updated.id,
                    "report": report,
                })),
            ));
        }
    }

    Ok(Json(DispatchResponse {
        job_id: job.id,
        queued: report.sent,
        estimated_seconds: deps.dispatcher.estimate_seconds(total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCheckRequest {
    pub keyword: String,
    pub place_id: String,
    pub place_name: String,
}

/// On-demand rank check for a single keyword.
///
/// Fetches the live results page and extracts the target's rank in-process,
/// bypassing the queue. Bulk backlogs go through the dispatch routes.
pub async fn check_rank(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(request): Json<RankCheckRequest>,
) -> Result<Json<RankSnapshot>, (StatusCode, Json<serde_json::Value>)> {
    if request.keyword.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "keyword must not be empty" })),
        ));
    }

    let target = Target {
        external_id: request.place_id,
        display_name: request.place_name,
    };
    let snapshot = state
        .deps
        .scraper
        .track_rank(&request.keyword, &target)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    info!(
        user_id = %user.user_id,
        keyword = %request.keyword,
        found = snapshot.found,
        "rank check served"
    );
    Ok(Json(snapshot))
}

/// Owner-checked job status query.
pub async fn get_job_status(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let job = state
        .deps
        .tracker
        .get_job(job_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    if job.owner_id != user.user_id {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(Json(json!({
        "jobId": job.id,
        "status": job.status,
        "progress": job.progress,
        "results": job.results,
        "error": job.error,
        "startedAt": job.started_at,
        "completedAt": job.completed_at,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCallback {
    pub current: u32,
    pub total: u32,
    /// Keyword the reporting worker just finished, for the activity log.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Rank snapshot for that keyword, appended to the job's results.
    #[serde(default)]
    pub result: Option<RankSnapshot>,
    /// Error from the worker; fails the whole aggregate job.
    #[serde(default)]
    pub error: Option<String>,
}

/// Worker progress/result callback.
///
/// Workers are internal callers authenticated by a shared token; this is the
/// path that turns remote scrape completions into job mutations and events.
pub async fn report_progress(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
    headers: HeaderMap,
    Json(callback): Json<ProgressCallback>,
) -> Result<StatusCode, StatusCode> {
    let deps = &state.deps;

    if let Some(expected) = &deps.worker_token {
        let presented = headers
            .get(WORKER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    // Unknown ids are accepted and dropped: the aggregate job may already be
    // gone while a stale worker still reports.
    let Some(job) = deps
        .tracker
        .update_progress(job_id, callback.current, callback.total)
    else {
        return Ok(StatusCode::ACCEPTED);
    };

    if let Some(result) = callback.result {
        deps.tracker
            .append_result(job_id, serde_json::to_value(&result).unwrap_or_default());
    }
    if let Some(keyword) = &callback.keyword {
        deps.bus.emit(TrackingEvent::LogUpdate {
            job_id,
            line: format!(
                "{} ({}/{})",
                keyword, job.progress.current, job.progress.total
            ),
        });
    }

    let finished = if let Some(error) = callback.error {
        deps.tracker.update_job(
            job_id,
            JobPatch::builder()
                .status(JobStatus::Failed)
                .error(JobFailure::now(error))
                .build(),
        )
    } else if job.progress.total > 0 && job.progress.current >= job.progress.total {
        deps.tracker.update_job(
            job_id,
            JobPatch::builder().status(JobStatus::Completed).build(),
        )
    } else {
        None
    };

    let latest = finished.or_else(|| deps.tracker.get_job(job_id));
    if let Some(latest) = latest {
        deps.bus.emit(TrackingEvent::status(&latest, None));
        deps.bus.emit(TrackingEvent::JobUpdate { job: latest });
    }

    Ok(StatusCode::OK)
}
