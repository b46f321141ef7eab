//! Job orchestration endpoints
//!
//! Submit, query, and track generation jobs. Credentials arrive
//! per-request in headers (`Authorization: Bearer` for Ark jobs,
//! `X-Access-Key-Id`/`X-Secret-Access-Key` for Visual jobs,
//! `X-App-Id`/`X-Access-Token` for speech), falling back to the
//! configuration store when absent.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use magma_common::config::ConfigStore;
use magma_common::CredentialSet;

use crate::config::resolve_credentials;
use crate::models::{JobHandle, JobRequest, JobResult, JobStatus, JobType, ProviderFamily};
use crate::services::{PollOptions, SubmitOutcome, TaskListQuery};
use crate::{ApiError, ApiResult, AppState, TrackedJob, TrackedOutcome};

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

/// POST /api/jobs/submit
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JobRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let credentials =
        credentials_from(&headers, request.job_type, state.config_store.as_ref())?;
    match state.jobs.submit(&request, &credentials).await? {
        SubmitOutcome::Pending(handle) => Ok(Json(SubmitResponse {
            job_type: request.job_type,
            status: JobStatus::Submitted,
            task_id: Some(handle.task_id),
            result: None,
        })),
        SubmitOutcome::Completed(result) => Ok(Json(SubmitResponse {
            job_type: request.job_type,
            status: result.status,
            task_id: None,
            result: Some(result),
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub task_id: String,
    pub job_type: JobType,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Raw provider payload for callers that want type-specific fields
    pub raw: Value,
}

/// POST /api/jobs/status: one status query
pub async fn job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let handle = JobHandle::new(request.task_id, request.job_type);
    let credentials = credentials_from(&headers, handle.job_type, state.config_store.as_ref())?;
    let payload = state.jobs.query(&handle, &credentials).await?;

    if let Some(soft) = handle.job_type.soft_error(&payload) {
        let result = JobResult::failed_with(soft, payload.clone());
        return Ok(Json(StatusResponse {
            status: JobStatus::Failed,
            result: Some(result),
            raw: payload,
        }));
    }

    let status = handle.job_type.status_from_payload(&payload);
    let result = match status {
        JobStatus::Succeeded => Some(JobResult::resolve(handle.job_type, payload.clone())),
        JobStatus::Failed => Some(JobResult::failed(payload.clone())),
        _ => None,
    };
    Ok(Json(StatusResponse {
        status,
        result,
        raw: payload,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WaitRequest {
    pub task_id: String,
    pub job_type: JobType,
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct WaitResponse {
    pub job_id: Uuid,
}

/// POST /api/jobs/wait: spawn a tracked polling loop
pub async fn track_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<WaitRequest>,
) -> ApiResult<Json<WaitResponse>> {
    let handle = JobHandle::new(request.task_id, request.job_type);
    let credentials = credentials_from(&headers, request.job_type, state.config_store.as_ref())?;

    let defaults = PollOptions::default();
    let options = PollOptions {
        interval: request
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval),
        timeout: request
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    };

    let job_id = Uuid::new_v4();
    let (status_tx, status_rx) = watch::channel(JobStatus::Submitted);
    let cancel = CancellationToken::new();
    let outcome = Arc::new(RwLock::new(None));
    state.tracked.write().await.insert(
        job_id,
        TrackedJob {
            handle: handle.clone(),
            cancel: cancel.clone(),
            status_rx,
            outcome: outcome.clone(),
        },
    );

    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        let result = jobs
            .poll_until_terminal(&handle, &credentials, &options, &cancel, Some(&status_tx))
            .await;
        let mut slot = outcome.write().await;
        *slot = Some(match result {
            Ok(result) => TrackedOutcome::Finished(result),
            Err(err) => TrackedOutcome::Error(err.to_string()),
        });
    });

    Ok(Json(WaitResponse { job_id }))
}

#[derive(Debug, Serialize)]
pub struct TrackedResponse {
    pub task_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/jobs/:job_id: tracked polling state
pub async fn tracked_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<TrackedResponse>> {
    let tracked = state
        .tracked
        .read()
        .await
        .get(&job_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("tracked job {job_id}")))?;

    let status = *tracked.status_rx.borrow();
    let (result, error) = match tracked.outcome.read().await.clone() {
        Some(TrackedOutcome::Finished(result)) => (Some(result), None),
        Some(TrackedOutcome::Error(message)) => (None, Some(message)),
        None => (None, None),
    };
    Ok(Json(TrackedResponse {
        task_id: tracked.handle.task_id.clone(),
        job_type: tracked.handle.job_type,
        status,
        result,
        error,
    }))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/jobs/:job_id/cancel: stop a tracked polling loop
///
/// Cancels between poll attempts; the provider-side task itself is not
/// touched and its handle remains valid.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let tracked = state
        .tracked
        .read()
        .await
        .get(&job_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("tracked job {job_id}")))?;
    tracked.cancel.cancel();
    Ok(Json(CancelResponse { cancelled: true }))
}

#[derive(Debug, Deserialize)]
pub struct TaskListParams {
    pub page_num: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub task_ids: Option<String>,
    pub model: Option<String>,
}

/// GET /api/jobs/ark/tasks: administrative task listing
pub async fn list_ark_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TaskListParams>,
) -> ApiResult<Json<Value>> {
    let credentials = credentials_from(&headers, JobType::ArkVideo, state.config_store.as_ref())?;
    let query = TaskListQuery {
        page_num: params.page_num,
        page_size: params.page_size,
        status: params.status,
        task_ids: params.task_ids,
        model: params.model,
    };
    let tasks = state
        .jobs
        .ark()
        .list_video_tasks(&query, &credentials)
        .await?;
    Ok(Json(tasks))
}

/// DELETE /api/jobs/ark/tasks/:task_id: administrative deletion,
/// separate from the polling lifecycle
pub async fn delete_ark_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let credentials = credentials_from(&headers, JobType::ArkVideo, state.config_store.as_ref())?;
    let response = state
        .jobs
        .ark()
        .delete_video_task(&task_id, &credentials)
        .await?;
    Ok(Json(response))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs/submit", post(submit_job))
        .route("/api/jobs/status", post(job_status))
        .route("/api/jobs/wait", post(track_job))
        .route("/api/jobs/ark/tasks", get(list_ark_tasks))
        .route("/api/jobs/ark/tasks/:task_id", delete(delete_ark_task))
        .route("/api/jobs/:job_id", get(tracked_job))
        .route("/api/jobs/:job_id/cancel", post(cancel_job))
}

/// Pull the credential shape the job type demands from request headers,
/// falling back to the configuration store
fn credentials_from(
    headers: &HeaderMap,
    job_type: JobType,
    store: &dyn ConfigStore,
) -> Result<CredentialSet, ApiError> {
    match job_type.family() {
        ProviderFamily::Ark => {
            if let Some(value) = headers.get(header::AUTHORIZATION) {
                let text = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("invalid Authorization header".into()))?;
                let key = text.strip_prefix("Bearer ").ok_or_else(|| {
                    ApiError::BadRequest("Authorization header must be `Bearer <api key>`".into())
                })?;
                return Ok(CredentialSet::bearer(key)?);
            }
            Ok(resolve_credentials(job_type, store)?)
        }
        ProviderFamily::Visual => {
            let id = header_value(headers, "x-access-key-id")?;
            let secret = header_value(headers, "x-secret-access-key")?;
            match (id, secret) {
                (Some(id), Some(secret)) => Ok(CredentialSet::access_keys(id, secret)?),
                _ => Ok(resolve_credentials(job_type, store)?),
            }
        }
        ProviderFamily::Speech => {
            let app_id = header_value(headers, "x-app-id")?;
            let token = header_value(headers, "x-access-token")?;
            match (app_id, token) {
                (Some(app_id), Some(token)) => Ok(CredentialSet::speech(app_id, token)?),
                _ => Ok(resolve_credentials(job_type, store)?),
            }
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.to_string()))
            .map_err(|_| ApiError::BadRequest(format!("invalid {name} header"))),
    }
}
