//! The axum `Router` mounting the producer/admin HTTP surface under
//! `/api/v1`. Handlers are thin: deserialize, delegate to `JobService`, map
//! the result to a status code per the error taxonomy.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use jobq_core::{EnqueueSpec, JobFilter, JobQueueError, JobStatus};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::service::{JobService, JobUpdate};

const API_V1_PREFIX: &str = "/api/v1";

#[derive(Clone)]
struct AppState {
    service: Arc<JobService>,
}

pub fn build_router(service: Arc<JobService>) -> Router {
    let state = AppState { service };

    let api = Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/bulk", post(create_jobs_bulk))
        .route("/jobs/stats/overview", get(job_stats))
        .route("/jobs/queue/:queue_name", get(jobs_by_queue))
        .route("/jobs/health/pending-count", get(pending_count))
        .route("/jobs/health/running-count", get(running_count))
        .route("/jobs/:id", get(get_job).put(update_job).delete(cancel_job))
        .route("/jobs/:id/retry", post(retry_job))
        .route("/admin/jobs/reset-stale", post(reset_stale_jobs))
        .route("/admin/jobs/cleanup", delete(cleanup_completed_jobs));

    Router::new()
        .route("/health", get(health))
        .nest(API_V1_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Wraps `JobQueueError` so handlers can just `?` out of the service layer.
struct ApiError(JobQueueError);

impl From<JobQueueError> for ApiError {
    fn from(error: JobQueueError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            JobQueueError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            JobQueueError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            JobQueueError::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            JobQueueError::UnknownJobType(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            JobQueueError::Store(error) => {
                tracing::error!(%error, "store error surfaced to producer API");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { detail: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

async fn create_job(State(state): State<AppState>, Json(spec): Json<EnqueueSpec>) -> Result<Response, ApiError> {
    let job = state.service.create_job(spec).await?;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

#[derive(Deserialize)]
struct BulkJobCreate {
    jobs: Vec<EnqueueSpec>,
}

async fn create_jobs_bulk(State(state): State<AppState>, Json(body): Json<BulkJobCreate>) -> Result<Response, ApiError> {
    let result = state.service.create_jobs_bulk(body.jobs).await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

#[derive(Deserialize)]
struct ListQuery {
    queue_name: Option<String>,
    status: Option<JobStatus>,
    job_type: Option<String>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_jobs(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Response, ApiError> {
    let filter = JobFilter {
        queue_name: query.queue_name,
        status: query.status,
        job_type: query.job_type,
    };
    let jobs = state.service.list_jobs(filter, query.skip, query.limit).await?;
    Ok(Json(jobs).into_response())
}

async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let job = state.service.get_job(id).await?;
    Ok(Json(job).into_response())
}

async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(raw): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    if raw.get("status").is_some() {
        return Err(JobQueueError::Validation("status cannot be updated directly; it only changes through claim/complete/fail/cancel".to_string()).into());
    }
    let update: JobUpdate = serde_json::from_value(raw)
        .map_err(|e| JobQueueError::Validation(format!("invalid update body: {e}")))?;
    let job = state.service.update_job(id, update).await?;
    Ok(Json(job).into_response())
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let job = state.service.cancel_job(id).await?;
    Ok(Json(job).into_response())
}

#[derive(Deserialize)]
struct RetryQuery {
    #[serde(default)]
    reset_attempts: bool,
}

async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RetryQuery>,
) -> Result<Response, ApiError> {
    let job = state.service.retry_job(id, query.reset_attempts).await?;
    Ok(Json(job).into_response())
}

async fn job_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.service.job_stats().await?;
    Ok(Json(stats).into_response())
}

#[derive(Deserialize)]
struct QueueQuery {
    status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    limit: i64,
}

async fn jobs_by_queue(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
    Query(query): Query<QueueQuery>,
) -> Result<Response, ApiError> {
    let jobs = state.service.jobs_by_queue(&queue_name, query.status, query.limit).await?;
    Ok(Json(jobs).into_response())
}

#[derive(Deserialize)]
struct QueueNameQuery {
    queue_name: Option<String>,
}

async fn pending_count(State(state): State<AppState>, Query(query): Query<QueueNameQuery>) -> Result<Response, ApiError> {
    let count = state.service.pending_count(query.queue_name.clone()).await?;
    Ok(Json(serde_json::json!({"pending_jobs": count, "queue": query.queue_name})).into_response())
}

async fn running_count(State(state): State<AppState>, Query(query): Query<QueueNameQuery>) -> Result<Response, ApiError> {
    let count = state.service.running_count(query.queue_name.clone()).await?;
    Ok(Json(serde_json::json!({"running_jobs": count, "queue": query.queue_name})).into_response())
}

#[derive(Deserialize)]
struct ResetStaleQuery {
    #[serde(default = "default_stale_timeout")]
    timeout_minutes: i64,
}

fn default_stale_timeout() -> i64 {
    30
}

async fn reset_stale_jobs(State(state): State<AppState>, Query(query): Query<ResetStaleQuery>) -> Result<Response, ApiError> {
    let reset = state.service.reset_stale_jobs(query.timeout_minutes).await?;
    Ok(Json(serde_json::json!({"reset": reset})).into_response())
}

#[derive(Deserialize)]
struct CleanupQuery {
    #[serde(default = "default_cleanup_age")]
    older_than_days: i64,
}

fn default_cleanup_age() -> i64 {
    7
}

async fn cleanup_completed_jobs(State(state): State<AppState>, Query(query): Query<CleanupQuery>) -> Result<Response, ApiError> {
    let deleted = state.service.cleanup_completed_jobs(query.older_than_days).await?;
    Ok(Json(serde_json::json!({"deleted": deleted})).into_response())
}
