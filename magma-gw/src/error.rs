//! Error types for magma-gw

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Orchestration-layer error, mapped by taxonomy
    #[error(transparent)]
    Job(#[from] magma_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use magma_common::Error as JobError;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Job(err) => {
                let code = match &err {
                    JobError::Config(_) => "CONFIG_ERROR",
                    JobError::MissingCredential { .. } => "MISSING_CREDENTIAL",
                    JobError::Validation(_) => "VALIDATION_ERROR",
                    JobError::Transport(_) => "TRANSPORT_ERROR",
                    JobError::Submission { .. } => "PROVIDER_REJECTED",
                    JobError::ProviderFailure { .. } => "PROVIDER_FAILURE",
                    JobError::PollTimeout { .. } => "POLL_TIMEOUT",
                    JobError::Cancelled { .. } => "CANCELLED",
                    JobError::Io(_) => "IO_ERROR",
                    JobError::Internal(_) => "INTERNAL_ERROR",
                };
                let status = match &err {
                    JobError::Config(_)
                    | JobError::MissingCredential { .. }
                    | JobError::Validation(_) => StatusCode::BAD_REQUEST,
                    JobError::Transport(_)
                    | JobError::Submission { .. }
                    | JobError::ProviderFailure { .. } => StatusCode::BAD_GATEWAY,
                    JobError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    JobError::Cancelled { .. } => StatusCode::CONFLICT,
                    JobError::Io(_) | JobError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, code, err.to_string())
            }
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
