//! Terminal result resolution
//!
//! Extracts artifacts from a terminal provider payload into the
//! job-type-agnostic [`JobResult`]. A succeeded job with no retrievable
//! artifact keeps `artifact_urls` empty, which is distinguishable from a
//! failure, which carries `status: Failed` and an error.

use base64::Engine;
use serde_json::Value;

use super::job::{JobStatus, JobType, ProviderError};

/// Normalized terminal payload for one job
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobResult {
    pub status: JobStatus,
    /// Ordered artifact URLs; empty when the job produced none
    pub artifact_urls: Vec<String>,
    /// Raw provider payload, preserved for callers that need type-specific
    /// fields the normalized shape does not carry
    pub raw: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl JobResult {
    /// Resolve a successful terminal payload
    pub fn resolve(job_type: JobType, payload: Value) -> Self {
        let artifact_urls = extract_artifacts(job_type, &payload);
        JobResult {
            status: JobStatus::Succeeded,
            artifact_urls,
            raw: payload,
            error: None,
        }
    }

    /// Build a failed result from a terminal payload, extracting the
    /// provider's error fields where present
    pub fn failed(payload: Value) -> Self {
        let error = extract_error(&payload);
        JobResult {
            status: JobStatus::Failed,
            artifact_urls: Vec::new(),
            raw: payload,
            error,
        }
    }

    /// Build a failed result from an already-detected provider error
    pub fn failed_with(error: ProviderError, payload: Value) -> Self {
        JobResult {
            status: JobStatus::Failed,
            artifact_urls: Vec::new(),
            raw: payload,
            error: Some(error),
        }
    }
}

/// Pull the job type's artifact field out of a terminal payload
pub fn extract_artifacts(job_type: JobType, payload: &Value) -> Vec<String> {
    match job_type.canonical() {
        JobType::JimengImage | JobType::Inpainting => image_list(payload),
        JobType::JimengVideoPro
        | JobType::MotionImitationClassic
        | JobType::MotionImitationJimeng
        | JobType::OmniHumanVideo
        | JobType::VideoEdit => payload
            .get("video_url")
            .and_then(Value::as_str)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default(),
        JobType::ArkVideo => payload
            .pointer("/content/video_url")
            .and_then(Value::as_str)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default(),
        JobType::SeedreamImage => payload
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        JobType::TextToSpeech => speech_data_url(payload).into_iter().collect(),
        JobType::JimengImageV31 | JobType::JimengI2iV30 => unreachable!(),
    }
}

/// `image_urls` list, falling back to inline base64 frames re-encoded as
/// `data:` URLs
fn image_list(payload: &Value) -> Vec<String> {
    if let Some(urls) = payload.get("image_urls").and_then(Value::as_array) {
        let urls: Vec<String> = urls
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !urls.is_empty() {
            return urls;
        }
    }
    payload
        .get("binary_data_base64")
        .and_then(Value::as_array)
        .map(|frames| {
            frames
                .iter()
                .filter_map(Value::as_str)
                .map(|b64| format!("data:image/png;base64,{b64}"))
                .collect()
        })
        .unwrap_or_default()
}

/// Synthesized audio arrives as base64 in `data`; surface it as a `data:`
/// URL so the result shape stays uniform across job types
fn speech_data_url(payload: &Value) -> Option<String> {
    let data = payload.get("data").and_then(Value::as_str)?;
    // Re-encode to guarantee a well-formed URL even if the provider pads oddly
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .ok()?;
    Some(format!(
        "data:audio/mpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

fn extract_error(payload: &Value) -> Option<ProviderError> {
    // Ark task shape: { "error": { "code", "message" } }
    if let Some(err) = payload.get("error").filter(|v| v.is_object()) {
        return Some(ProviderError {
            code: err
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("provider reported an error")
                .to_string(),
        });
    }
    // Visual shape: flat error_code / message
    let code = payload
        .get("error_code")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .or_else(|| {
            payload
                .get("code")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|c| c != "10000")
        })?;
    Some(ProviderError {
        code,
        message: payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("provider reported an error")
            .to_string(),
    })
}
