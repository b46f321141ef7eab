//! Job submission gateway
//!
//! Single entry point normalizing every job type into one
//! submit/poll/result protocol. Submission performs exactly one request
//! and never retries (resubmission may create a duplicate billable job);
//! synchronous job types complete at submission, asynchronous ones return
//! a handle for the poller.

use async_trait::async_trait;
use magma_common::{CredentialSet, Error, Result};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::models::{
    normalize, JobHandle, JobRequest, JobResult, JobStatus, JobType, ProviderFamily,
};
use crate::services::ark_client::ArkClient;
use crate::services::job_tracker::{self, PollOptions, TaskQuery};
use crate::services::speech_client::SpeechClient;
use crate::services::visual_client::VisualClient;

/// What a submission produced: a handle to poll, or the terminal result
/// itself for synchronous job types
#[derive(Debug)]
pub enum SubmitOutcome {
    Pending(JobHandle),
    Completed(JobResult),
}

/// Dependency-injected provider client bundle
///
/// Explicitly constructed and passed to callers; no process-wide mutable
/// state, so concurrent jobs can be tested in isolation.
pub struct JobClient {
    ark: ArkClient,
    visual: VisualClient,
    speech: SpeechClient,
}

impl JobClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ark: ArkClient::new()?,
            visual: VisualClient::new()?,
            speech: SpeechClient::new()?,
        })
    }

    /// Normalize and submit one job; exactly one provider request
    pub async fn submit(
        &self,
        request: &JobRequest,
        credentials: &CredentialSet,
    ) -> Result<SubmitOutcome> {
        ensure_credential_shape(request.job_type, credentials)?;
        let payload = normalize(request.job_type, &request.parameters)?;

        match request.job_type.canonical() {
            JobType::SeedreamImage => {
                let response = self.ark.generate_images(&payload, credentials).await?;
                Ok(SubmitOutcome::Completed(JobResult::resolve(
                    request.job_type,
                    response,
                )))
            }
            JobType::ArkVideo => {
                let task_id = self.ark.create_video_task(&payload, credentials).await?;
                info!(task_id = %task_id, job_type = %request.job_type, "task submitted");
                Ok(SubmitOutcome::Pending(JobHandle::new(
                    task_id,
                    request.job_type,
                )))
            }
            JobType::Inpainting => {
                let response = self.visual.process(&payload, credentials).await?;
                Ok(SubmitOutcome::Completed(JobResult::resolve(
                    request.job_type,
                    response,
                )))
            }
            JobType::TextToSpeech => {
                let response = self.speech.synthesize(&payload, credentials).await?;
                Ok(SubmitOutcome::Completed(JobResult::resolve(
                    request.job_type,
                    response,
                )))
            }
            _ => {
                let task_id = self.visual.submit_task(&payload, credentials).await?;
                info!(task_id = %task_id, job_type = %request.job_type, "task submitted");
                Ok(SubmitOutcome::Pending(JobHandle::new(
                    task_id,
                    request.job_type,
                )))
            }
        }
    }

    /// One status query, re-sending the type's fixed request key
    pub async fn query(&self, handle: &JobHandle, credentials: &CredentialSet) -> Result<Value> {
        match handle.job_type.family() {
            ProviderFamily::Ark => self.ark.get_video_task(&handle.task_id, credentials).await,
            ProviderFamily::Visual => {
                let req_key = handle.job_type.req_key().ok_or_else(|| {
                    Error::Validation(format!(
                        "{} has no request key to poll with",
                        handle.job_type
                    ))
                })?;
                self.visual
                    .query_task(req_key, &handle.task_id, credentials)
                    .await
            }
            ProviderFamily::Speech => Err(Error::Validation(
                "speech synthesis completes at submission and has no status to poll".to_string(),
            )),
        }
    }

    /// Poll one handle until terminal, timeout, or cancellation
    pub async fn poll_until_terminal(
        &self,
        handle: &JobHandle,
        credentials: &CredentialSet,
        options: &PollOptions,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<JobStatus>>,
    ) -> Result<JobResult> {
        let bound = BoundQuery {
            client: self,
            credentials,
        };
        job_tracker::poll_until_terminal(&bound, handle, options, cancel, progress).await
    }

    /// Administrative access to the Ark client (task listing/deletion)
    pub fn ark(&self) -> &ArkClient {
        &self.ark
    }
}

/// A status query bound to one job's credentials
struct BoundQuery<'a> {
    client: &'a JobClient,
    credentials: &'a CredentialSet,
}

#[async_trait]
impl TaskQuery for BoundQuery<'_> {
    async fn query_status(&self, handle: &JobHandle) -> Result<Value> {
        self.client.query(handle, self.credentials).await
    }
}

fn ensure_credential_shape(job_type: JobType, credentials: &CredentialSet) -> Result<()> {
    let matches = match job_type.family() {
        ProviderFamily::Ark => matches!(credentials, CredentialSet::Bearer { .. }),
        ProviderFamily::Visual => matches!(credentials, CredentialSet::AccessKeys { .. }),
        ProviderFamily::Speech => matches!(credentials, CredentialSet::Speech { .. }),
    };
    if matches {
        Ok(())
    } else {
        let expected = match job_type.family() {
            ProviderFamily::Ark => "bearer API key",
            ProviderFamily::Visual => "access-key pair",
            ProviderFamily::Speech => "app id + access token",
        };
        Err(Error::Validation(format!(
            "{job_type} requires {expected} credentials"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(job_type: JobType, params: Value) -> JobRequest {
        JobRequest {
            job_type,
            parameters: params.as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn credential_shape_is_checked_before_normalization_or_network() {
        let client = JobClient::new().unwrap();
        let creds = CredentialSet::bearer("sk-1").unwrap();
        let err = client
            .submit(
                &request(JobType::JimengImage, json!({"prompt": "p"})),
                &creds,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert!(err.to_string().contains("access-key"));
    }

    #[tokio::test]
    async fn validation_errors_surface_before_any_network_call() {
        let client = JobClient::new().unwrap();
        let creds = CredentialSet::access_keys("AKID", "secret").unwrap();
        // Missing required prompt fails locally; no provider is reachable
        // in this test environment, so an attempted call would show up as
        // a transport error instead
        let err = client
            .submit(&request(JobType::JimengImage, json!({"seed": 7})), &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[tokio::test]
    async fn speech_handles_cannot_be_polled() {
        let client = JobClient::new().unwrap();
        let creds = CredentialSet::speech("app", "token").unwrap();
        let handle = JobHandle::new("t-1", JobType::TextToSpeech);
        let err = client.query(&handle, &creds).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
