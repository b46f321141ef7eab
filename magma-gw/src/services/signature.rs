//! Volcengine request signing (HMAC-SHA256, V4-style)
//!
//! The Visual endpoints (service `cv`) and TOS object storage (service
//! `tos`) authenticate with a canonical-request signature. The two differ
//! only in the algorithm label and the `AWS4` secret prefix used by the
//! S3-compatible TOS variant. Signing is timestamp-injectable so its
//! output is deterministic under test.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use magma_common::{Error, Result};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Signer bound to one key pair, service, and region
#[derive(Clone)]
pub struct RequestSigner {
    access_key_id: String,
    secret_access_key: String,
    service: String,
    region: String,
}

impl RequestSigner {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            service: service.into(),
            region: region.into(),
        }
    }

    /// Sign a request, returning the full header set to send
    /// (input headers plus `Host`, `X-Date`, and `Authorization`)
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        self.sign_at(method, url, headers, body, Utc::now())
    }

    pub fn sign_at(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid request URL `{url}`: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Validation(format!("request URL `{url}` has no host")))?;
        let path = if parsed.path().is_empty() {
            "/"
        } else {
            parsed.path()
        };
        let query = parsed.query().unwrap_or("");

        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let algorithm = if self.service == "tos" {
            "AWS4-HMAC-SHA256"
        } else {
            "HMAC-SHA256"
        };

        let mut sign_headers: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        upsert(&mut sign_headers, "Host", host);
        upsert(&mut sign_headers, "X-Date", &timestamp);
        if body.is_some() && !has_header(&sign_headers, "content-type") {
            sign_headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let canonical_request = [
            method.to_uppercase(),
            percent_encode(path, true),
            canonical_query_string(query),
            canonical_headers(&sign_headers),
            signed_header_names(&sign_headers),
            sha256_hex(body.unwrap_or("")),
        ]
        .join("\n");

        let credential_scope = format!("{date_stamp}/{}/{}/request", self.region, self.service);
        let string_to_sign = [
            algorithm.to_string(),
            timestamp,
            credential_scope.clone(),
            sha256_hex(&canonical_request),
        ]
        .join("\n");

        // TOS derives its key chain from an AWS4-prefixed secret
        let secret = if self.service == "tos" {
            format!("AWS4{}", self.secret_access_key)
        } else {
            self.secret_access_key.clone()
        };
        let k_date = hmac_sha256(secret.as_bytes(), &date_stamp);
        let k_region = hmac_sha256(&k_date, &self.region);
        let k_service = hmac_sha256(&k_region, &self.service);
        let k_signing = hmac_sha256(&k_service, "request");
        let signature = hex::encode(hmac_sha256(&k_signing, &string_to_sign));

        let authorization = format!(
            "{algorithm} Credential={}/{credential_scope}, SignedHeaders={}, Signature={signature}",
            self.access_key_id,
            signed_header_names(&sign_headers),
        );
        sign_headers.push(("Authorization".to_string(), authorization));
        Ok(sign_headers)
    }
}

fn upsert(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
    {
        Some((_, v)) => *v = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

fn has_header(headers: &[(String, String)], lower_name: &str) -> bool {
    headers.iter().any(|(k, _)| k.to_lowercase() == lower_name)
}

/// Lowercased, whitespace-collapsed, sorted `key:value\n` block
fn canonical_headers(headers: &[(String, String)]) -> String {
    let mut entries: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_lowercase(),
                v.split_whitespace().collect::<Vec<_>>().join(" "),
            )
        })
        .collect();
    entries.sort();
    entries
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect()
}

fn signed_header_names(headers: &[(String, String)]) -> String {
    let mut names: Vec<String> = headers.iter().map(|(k, _)| k.to_lowercase()).collect();
    names.sort();
    names.join(";")
}

fn canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut params: Vec<(String, String)> = query
        .split('&')
        .map(|param| match param.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (param.to_string(), String::new()),
        })
        .collect();
    params.sort();
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k, false), percent_encode(v, false)))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 percent-encoding; `keep_slash` preserves path separators
fn percent_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 2, 8, 30, 0).unwrap()
    }

    fn cv_signer() -> RequestSigner {
        RequestSigner::new("AKID", "secret", "cv", "cn-north-1")
    }

    #[test]
    fn signing_is_deterministic_for_a_pinned_timestamp() {
        let signer = cv_signer();
        let url = "https://visual.volcengineapi.com/?Action=CVSync2AsyncSubmitTask&Version=2022-08-31";
        let headers = [("Content-Type", "application/json")];
        let a = signer
            .sign_at("POST", url, &headers, Some("{}"), fixed_time())
            .unwrap();
        let b = signer
            .sign_at("POST", url, &headers, Some("{}"), fixed_time())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn authorization_carries_scope_and_sorted_headers() {
        let signer = cv_signer();
        let headers = signer
            .sign_at(
                "POST",
                "https://visual.volcengineapi.com/?Action=CVProcess&Version=2022-08-31",
                &[("Content-Type", "application/json")],
                Some("{\"req_key\":\"i2i_inpainting\"}"),
                fixed_time(),
            )
            .unwrap();
        let auth = &headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .unwrap()
            .1;
        assert!(auth.starts_with("HMAC-SHA256 Credential=AKID/20251002/cn-north-1/cv/request"));
        assert!(auth.contains("SignedHeaders=content-type;host;x-date"));
    }

    #[test]
    fn x_date_matches_injected_timestamp() {
        let headers = cv_signer()
            .sign_at(
                "POST",
                "https://visual.volcengineapi.com/?Action=CVProcess&Version=2022-08-31",
                &[],
                None,
                fixed_time(),
            )
            .unwrap();
        let x_date = &headers.iter().find(|(k, _)| k == "X-Date").unwrap().1;
        assert_eq!(x_date, "20251002T083000Z");
    }

    #[test]
    fn tos_uses_aws4_algorithm_label() {
        let signer = RequestSigner::new("AKID", "secret", "tos", "cn-beijing");
        let headers = signer
            .sign_at(
                "PUT",
                "https://bucket.tos-cn-beijing.volces.com/uploads/x.png",
                &[("Content-Type", "application/octet-stream")],
                None,
                fixed_time(),
            )
            .unwrap();
        let auth = &headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .unwrap()
            .1;
        assert!(auth.starts_with("AWS4-HMAC-SHA256 "));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let url = "https://visual.volcengineapi.com/?Action=CVProcess&Version=2022-08-31";
        let a = cv_signer()
            .sign_at("POST", url, &[], Some("{}"), fixed_time())
            .unwrap();
        let b = RequestSigner::new("AKID", "other-secret", "cv", "cn-north-1")
            .sign_at("POST", url, &[], Some("{}"), fixed_time())
            .unwrap();
        let auth = |hs: &[(String, String)]| {
            hs.iter()
                .find(|(k, _)| k == "Authorization")
                .unwrap()
                .1
                .clone()
        };
        assert_ne!(auth(&a), auth(&b));
    }

    #[test]
    fn query_parameters_are_sorted_canonically() {
        assert_eq!(
            canonical_query_string("Version=2022-08-31&Action=CVProcess"),
            "Action=CVProcess&Version=2022-08-31"
        );
    }

    #[test]
    fn percent_encoding_preserves_unreserved_only() {
        assert_eq!(percent_encode("a b/c", false), "a%20b%2Fc");
        assert_eq!(percent_encode("a b/c", true), "a%20b/c");
    }
}
