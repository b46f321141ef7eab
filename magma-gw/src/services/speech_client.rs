//! Speech synthesis client
//!
//! Synchronous text-to-speech against the openspeech endpoint. The
//! normalized payload arrives without its `app` section; the client
//! injects app id, access token, and cluster at call time so credentials
//! never pass through normalization. Success is envelope code 3000, with
//! the synthesized audio as base64 in `data`.

use magma_common::{CredentialSet, Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const TTS_BASE_URL: &str = "https://openspeech.bytedance.com/api/v1/tts";
const TTS_CLUSTER: &str = "volcano_tts";
/// Envelope code the speech service uses for success
const TTS_SUCCESS_CODE: i64 = 3000;

/// Speech synthesis client
pub struct SpeechClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpeechClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            http,
            base_url: TTS_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Synthesize speech; returns the full response envelope (the audio
    /// payload lives at its top level)
    pub async fn synthesize(&self, payload: &Value, credentials: &CredentialSet) -> Result<Value> {
        let CredentialSet::Speech {
            app_id,
            access_token,
        } = credentials
        else {
            return Err(Error::Validation(
                "speech synthesis requires app credentials (app id + access token)".to_string(),
            ));
        };

        let mut body = payload.as_object().cloned().unwrap_or_default();
        body.insert(
            "app".to_string(),
            json!({
                "appid": app_id,
                "token": access_token,
                "cluster": TTS_CLUSTER,
            }),
        );

        debug!("submitting speech synthesis");
        let response = self
            .http
            .post(&self.base_url)
            // The speech service expects this non-standard separator
            .header("Authorization", format!("Bearer;{access_token}"))
            .json(&Value::Object(body))
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
            Some(TTS_SUCCESS_CODE) | None => Ok(envelope),
            Some(code) => Err(Error::ProviderFailure {
                code: code.to_string(),
                message: envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            }),
        }
    }
}
