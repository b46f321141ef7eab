//! Visual (CV) service client
//!
//! Signed access to the provider's visual endpoints: asynchronous task
//! submission and querying (`CVSync2AsyncSubmitTask` /
//! `CVSync2AsyncGetResult`) and synchronous processing (`CVProcess`).
//! Responses arrive in a `{code, message, data}` envelope where code
//! 10000 means success; any other code is a provider-reported failure
//! even when the HTTP layer says 200.

use magma_common::{CredentialSet, Error, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::signature::RequestSigner;

const VISUAL_BASE_URL: &str = "https://visual.volcengineapi.com";
const VISUAL_API_VERSION: &str = "2022-08-31";
const VISUAL_SERVICE: &str = "cv";
const VISUAL_REGION: &str = "cn-north-1";
/// Envelope code the provider uses for success
const VISUAL_SUCCESS_CODE: i64 = 10000;

const SUBMIT_ACTION: &str = "CVSync2AsyncSubmitTask";
const QUERY_ACTION: &str = "CVSync2AsyncGetResult";
const PROCESS_ACTION: &str = "CVProcess";

/// Visual endpoint client
pub struct VisualClient {
    http: reqwest::Client,
    base_url: String,
}

impl VisualClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            http,
            base_url: VISUAL_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Submit an asynchronous task; returns the provider task identifier
    pub async fn submit_task(
        &self,
        payload: &Value,
        credentials: &CredentialSet,
    ) -> Result<String> {
        let data = self.call(SUBMIT_ACTION, payload, credentials).await?;
        data.get("task_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Internal(format!("submit response carried no task_id: {data}"))
            })
    }

    /// Query task state; returns the per-task data object
    pub async fn query_task(
        &self,
        req_key: &str,
        task_id: &str,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let mut body = Map::new();
        body.insert("req_key".to_string(), Value::String(req_key.to_string()));
        body.insert("task_id".to_string(), Value::String(task_id.to_string()));
        self.call(QUERY_ACTION, &Value::Object(body), credentials)
            .await
    }

    /// Synchronous CV processing (inpainting); returns the result data
    pub async fn process(&self, payload: &Value, credentials: &CredentialSet) -> Result<Value> {
        self.call(PROCESS_ACTION, payload, credentials).await
    }

    async fn call(
        &self,
        action: &str,
        payload: &Value,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let CredentialSet::AccessKeys {
            access_key_id,
            secret_access_key,
        } = credentials
        else {
            return Err(Error::Validation(format!(
                "{action} requires access-key credentials"
            )));
        };

        let url = format!(
            "{}/?Action={action}&Version={VISUAL_API_VERSION}",
            self.base_url
        );
        let body = serde_json::to_string(payload)
            .map_err(|e| Error::Internal(format!("payload serialization failed: {e}")))?;
        let signer = RequestSigner::new(
            access_key_id,
            secret_access_key,
            VISUAL_SERVICE,
            VISUAL_REGION,
        );
        let headers = signer.sign(
            "POST",
            &url,
            &[("Content-Type", "application/json")],
            Some(&body),
        )?;

        debug!(action, "calling visual endpoint");
        let mut request = self.http.post(&url).body(body);
        for (name, value) in &headers {
            // reqwest derives Host from the URL, which is what was signed
            if !name.eq_ignore_ascii_case("host") {
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Submission {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| Error::Internal(format!("provider returned non-JSON body: {e}")))?;
        match envelope.get("code").and_then(Value::as_i64) {
            Some(VISUAL_SUCCESS_CODE) => Ok(envelope
                .get("data")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))),
            Some(code) => Err(Error::ProviderFailure {
                code: code.to_string(),
                message: envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            }),
            // No recognizable envelope; let per-type status mapping decide
            None => Ok(envelope),
        }
    }
}
