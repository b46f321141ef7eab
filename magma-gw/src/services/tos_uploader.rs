//! TOS artifact upload
//!
//! Moves local binary assets to object storage and yields a stable URL
//! the generation provider can dereference. All preconditions are
//! validated before any network call, in a fixed precedence order so the
//! caller can direct the user to the exact missing configuration:
//! file → bucket → region → access key → secret key. Exactly one PUT per
//! call; retries are a caller concern.

use chrono::{DateTime, Utc};
use magma_common::{Error, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

use super::signature::RequestSigner;

const TOS_SERVICE: &str = "tos";
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Durable artifact reference produced by one upload; immutable
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadedArtifact {
    pub url: String,
    pub bucket: String,
    pub region: String,
}

/// Object-storage uploader
pub struct TosUploader {
    http: reqwest::Client,
}

impl TosUploader {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self { http })
    }

    pub async fn upload(
        &self,
        file_bytes: &[u8],
        filename: &str,
        bucket: &str,
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<UploadedArtifact> {
        if file_bytes.is_empty() {
            return Err(Error::Validation(
                "file is required and may not be empty".to_string(),
            ));
        }
        if file_bytes.len() > MAX_UPLOAD_BYTES {
            return Err(Error::Validation(
                "file exceeds the 100 MiB upload limit".to_string(),
            ));
        }
        if bucket.trim().is_empty() {
            return Err(Error::Config(
                "tos_bucket_name is not configured; set it in the `tos` config category"
                    .to_string(),
            ));
        }
        if region.trim().is_empty() {
            return Err(Error::Config(
                "tos_region is not configured; set it in the `tos` config category".to_string(),
            ));
        }
        if access_key_id.trim().is_empty() {
            return Err(Error::MissingCredential {
                field: "access_key_id",
                hint: "configure tos.tos_access_key or export MAGMA_TOS_ACCESS_KEY".to_string(),
            });
        }
        if secret_access_key.trim().is_empty() {
            return Err(Error::MissingCredential {
                field: "secret_access_key",
                hint: "configure tos.tos_secret_key or export MAGMA_TOS_SECRET_KEY".to_string(),
            });
        }

        let key = object_key(file_bytes, filename, Utc::now());
        let url = format!("https://{bucket}.tos-{region}.volces.com/{key}");
        let signer = RequestSigner::new(access_key_id, secret_access_key, TOS_SERVICE, region);
        let headers = signer.sign(
            "PUT",
            &url,
            &[("Content-Type", "application/octet-stream")],
            None,
        )?;

        let mut request = self.http.put(&url).body(file_bytes.to_vec());
        for (name, value) in &headers {
            if !name.eq_ignore_ascii_case("host") {
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            info!(bucket, key = %key, size = file_bytes.len(), "artifact uploaded");
            return Ok(UploadedArtifact {
                url,
                bucket: bucket.to_string(),
                region: region.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Submission {
            status: status.as_u16(),
            body: flatten_rejection(&body),
        })
    }
}

/// `uploads/{timestamp}_{hash8}{ext}`: unique, sortable, and
/// extension-preserving; the hash covers the first 1 KiB of content
fn object_key(file_bytes: &[u8], filename: &str, now: DateTime<Utc>) -> String {
    let sample = &file_bytes[..file_bytes.len().min(1024)];
    let mut hasher = Sha256::new();
    hasher.update(sample);
    let digest = hex::encode(hasher.finalize());
    let ext = std::path::Path::new(filename)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("uploads/{}_{}{}", now.format("%Y%m%d_%H%M%S"), &digest[..8], ext)
}

/// Reassemble field-level validation errors into
/// `field: message; field: message`; otherwise surface the top-level
/// message unchanged
fn flatten_rejection(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    if let Some(details) = parsed.get("detail").and_then(Value::as_array) {
        let parts: Vec<String> = details
            .iter()
            .filter_map(|item| {
                let msg = item.get("msg").and_then(Value::as_str)?;
                let loc = item
                    .get("loc")
                    .and_then(Value::as_array)
                    .map(|loc| {
                        loc.iter()
                            .map(|part| match part {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(".")
                    })
                    .unwrap_or_default();
                Some(if loc.is_empty() {
                    msg.to_string()
                } else {
                    format!("{loc}: {msg}")
                })
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }
    if let Some(detail) = parsed.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }
    if let Some(message) = parsed.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn try_upload(
        file: &[u8],
        bucket: &str,
        region: &str,
        akid: &str,
        secret: &str,
    ) -> Error {
        TosUploader::new()
            .unwrap()
            .upload(file, "clip.mp4", bucket, region, akid, secret)
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn validation_precedence_is_fixed() {
        // Missing file wins over everything else
        let err = try_upload(b"", "", "", "", "").await;
        assert!(matches!(err, Error::Validation(_)), "{err}");

        // Then bucket
        let err = try_upload(b"data", "", "", "", "").await;
        assert!(err.to_string().contains("tos_bucket_name"), "{err}");

        // Then region
        let err = try_upload(b"data", "media", "", "", "").await;
        assert!(err.to_string().contains("tos_region"), "{err}");

        // Then access key
        let err = try_upload(b"data", "media", "cn-beijing", "", "x").await;
        match err {
            Error::MissingCredential { field, .. } => assert_eq!(field, "access_key_id"),
            other => panic!("unexpected error: {other}"),
        }

        // Then secret key
        let err = try_upload(b"data", "media", "cn-beijing", "AKID", "  ").await;
        match err {
            Error::MissingCredential { field, .. } => assert_eq!(field, "secret_access_key"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_locally() {
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let err = try_upload(&big, "media", "cn-beijing", "AKID", "secret").await;
        assert!(err.to_string().contains("100 MiB"), "{err}");
    }

    #[test]
    fn object_key_shape_is_stable() {
        let at = Utc.with_ymd_and_hms(2025, 10, 2, 8, 30, 0).unwrap();
        let key = object_key(b"hello world", "portrait.PNG", at);
        assert!(key.starts_with("uploads/20251002_083000_"), "{key}");
        assert!(key.ends_with(".PNG"), "{key}");
        // timestamp + underscore + 8 hex chars + extension
        let hash_part = key
            .trim_start_matches("uploads/20251002_083000_")
            .trim_end_matches(".PNG");
        assert_eq!(hash_part.len(), 8);
    }

    #[test]
    fn key_hash_depends_on_content() {
        let at = Utc.with_ymd_and_hms(2025, 10, 2, 8, 30, 0).unwrap();
        assert_ne!(
            object_key(b"aaaa", "a.png", at),
            object_key(b"bbbb", "a.png", at)
        );
    }

    #[test]
    fn filename_without_extension_gets_bare_key() {
        let at = Utc.with_ymd_and_hms(2025, 10, 2, 8, 30, 0).unwrap();
        let key = object_key(b"data", "README", at);
        assert!(!key.contains('.'), "{key}");
    }

    #[test]
    fn field_level_rejections_are_reassembled() {
        let body = r#"{"detail": [
            {"loc": ["body", "bucket"], "msg": "field required"},
            {"loc": ["body", "region"], "msg": "field required"}
        ]}"#;
        assert_eq!(
            flatten_rejection(body),
            "body.bucket: field required; body.region: field required"
        );
    }

    #[test]
    fn string_detail_is_surfaced_unchanged() {
        assert_eq!(
            flatten_rejection(r#"{"detail": "bucket does not exist"}"#),
            "bucket does not exist"
        );
    }

    #[test]
    fn non_json_body_is_surfaced_raw() {
        assert_eq!(flatten_rejection("<Error>AccessDenied</Error>"), "<Error>AccessDenied</Error>");
    }
}
