//! Artifact upload endpoint
//!
//! Multipart upload to object storage, mirroring the uploader's fixed
//! validation precedence. Storage settings may arrive as form fields or
//! fall back to the configuration store.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::{ApiError, ApiResult, AppState};

/// Body limit: the uploader's 100 MiB cap plus multipart overhead
const UPLOAD_BODY_LIMIT: usize = 104 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub bucket: String,
    pub region: String,
}

/// POST /api/upload
pub async fn upload_artifact(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut overrides: HashMap<String, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed reading file field: {e}")))?;
            file = Some((bytes.to_vec(), filename));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed reading `{name}` field: {e}")))?;
            overrides.insert(name, value);
        }
    }

    let settings = crate::config::resolve_tos_settings(state.config_store.as_ref());
    let take = |name: &str, fallback: String| -> String {
        overrides.get(name).cloned().unwrap_or(fallback)
    };
    let bucket = take("bucket", settings.bucket);
    let region = take("region", settings.region);
    let access_key_id = take("access_key_id", settings.access_key_id);
    let secret_access_key = take("secret_access_key", settings.secret_access_key);

    // A missing file is reported by the uploader itself, first in its
    // validation order
    let (bytes, filename) = file.unwrap_or_else(|| (Vec::new(), "upload.bin".to_string()));

    let artifact = state
        .uploader
        .upload(
            &bytes,
            &filename,
            &bucket,
            &region,
            &access_key_id,
            &secret_access_key,
        )
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        url: artifact.url,
        bucket: artifact.bucket,
        region: artifact.region,
    }))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_artifact))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
