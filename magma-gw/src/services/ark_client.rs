//! Ark service client
//!
//! Bearer-authenticated access to the Ark endpoints: synchronous image
//! generation and the asynchronous video task lifecycle (create, get,
//! list, delete). Exactly one HTTP request per call; retry policy belongs
//! to the caller because submissions are billable and not idempotent.

use magma_common::{CredentialSet, Error, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

const ARK_BASE_URL: &str = "https://ark.cn-beijing.volces.com";
const IMAGES_PATH: &str = "/api/v3/images/generations";
const VIDEO_TASKS_PATH: &str = "/api/v3/contents/generations/tasks";

/// Filters for the administrative task listing
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub page_num: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub task_ids: Option<String>,
    pub model: Option<String>,
}

/// Ark endpoint client
pub struct ArkClient {
    http: reqwest::Client,
    base_url: String,
}

impl ArkClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            http,
            base_url: ARK_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Synchronous image generation; returns the full response payload
    pub async fn generate_images(
        &self,
        payload: &Value,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let api_key = bearer_key(credentials)?;
        debug!("submitting image generation");
        let response = self
            .http
            .post(format!("{}{IMAGES_PATH}", self.base_url))
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        read_json(response).await
    }

    /// Create an asynchronous video task; returns the provider task id
    pub async fn create_video_task(
        &self,
        payload: &Value,
        credentials: &CredentialSet,
    ) -> Result<String> {
        let api_key = bearer_key(credentials)?;
        debug!("creating video generation task");
        let response = self
            .http
            .post(format!("{}{VIDEO_TASKS_PATH}", self.base_url))
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let body = read_json(response).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Internal(format!("task creation carried no id: {body}")))
    }

    /// Query one video task
    pub async fn get_video_task(
        &self,
        task_id: &str,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let api_key = bearer_key(credentials)?;
        let response = self
            .http
            .get(format!("{}{VIDEO_TASKS_PATH}/{task_id}", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        read_json(response).await
    }

    /// Administrative: list video tasks with optional filters
    pub async fn list_video_tasks(
        &self,
        query: &TaskListQuery,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let api_key = bearer_key(credentials)?;
        let mut params: Vec<(&str, String)> = Vec::new();
        params.push(("page_num", query.page_num.unwrap_or(1).to_string()));
        params.push(("page_size", query.page_size.unwrap_or(20).to_string()));
        if let Some(status) = &query.status {
            params.push(("filter.status", status.clone()));
        }
        if let Some(task_ids) = &query.task_ids {
            params.push(("filter.task_ids", task_ids.clone()));
        }
        if let Some(model) = &query.model {
            params.push(("filter.model", model.clone()));
        }
        let response = self
            .http
            .get(format!("{}{VIDEO_TASKS_PATH}", self.base_url))
            .query(&params)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        read_json(response).await
    }

    /// Administrative: delete a video task (separate from the polling
    /// lifecycle; a handle is never deleted implicitly)
    pub async fn delete_video_task(
        &self,
        task_id: &str,
        credentials: &CredentialSet,
    ) -> Result<Value> {
        let api_key = bearer_key(credentials)?;
        let response = self
            .http
            .delete(format!("{}{VIDEO_TASKS_PATH}/{task_id}", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        read_json(response).await
    }
}

fn bearer_key(credentials: &CredentialSet) -> Result<&str> {
    match credentials {
        CredentialSet::Bearer { api_key } => Ok(api_key),
        _ => Err(Error::Validation(
            "Ark endpoints require bearer credentials (API key)".to_string(),
        )),
    }
}

/// Shared response handling: non-success bodies surface verbatim as a
/// provider rejection, distinct from transport failures
async fn read_json(response: reqwest::Response) -> Result<Value> {
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
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(&text)
        .map_err(|e| Error::Internal(format!("provider returned non-JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_access_key_credentials_before_any_network_call() {
        let client = ArkClient::new().unwrap().with_base_url("http://127.0.0.1:1");
        let creds = CredentialSet::access_keys("AKID12345", "secret").unwrap();
        let err = client.get_video_task("cgt-1", &creds).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn list_query_defaults_pagination() {
        let query = TaskListQuery::default();
        assert_eq!(query.page_num, None);
        assert_eq!(query.page_size, None);
    }
}
