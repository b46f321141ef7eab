//! Job polling and state tracking
//!
//! Drives one task from submission to a terminal state. Each concurrently
//! tracked job owns its own handle, credentials, and deadline; the only
//! shared resource is the HTTP client behind the [`TaskQuery`] seam, which
//! reuses connections without shared mutable state. Between polls the loop
//! suspends on the timer, so waiting occupies no thread, and cancellation
//! is honored at every suspension point (an in-flight query completes on
//! its own transport deadline).

use async_trait::async_trait;
use magma_common::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{JobHandle, JobResult, JobStatus};

/// One status query against the provider, bound to credentials
#[async_trait]
pub trait TaskQuery: Send + Sync {
    async fn query_status(&self, handle: &JobHandle) -> Result<Value>;
}

/// Polling knobs; each tracked job owns its own copy
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll until Succeeded, Failed, timeout, or cancellation
///
/// Never returns an `Unknown` status: unrecognized or missing status
/// fields are logged and polling continues to the same deadline as
/// Processing. A soft error (transport success with an embedded failure
/// code) is terminal `Failed`. Transport failures on the read-only query
/// are retried until the deadline. On timeout the handle remains valid
/// for later re-polling.
pub async fn poll_until_terminal(
    query: &dyn TaskQuery,
    handle: &JobHandle,
    options: &PollOptions,
    cancel: &CancellationToken,
    progress: Option<&watch::Sender<JobStatus>>,
) -> Result<JobResult> {
    let started = Instant::now();
    loop {
        match query.query_status(handle).await {
            Ok(payload) => {
                if let Some(soft) = handle.job_type.soft_error(&payload) {
                    warn!(
                        task_id = %handle.task_id,
                        code = %soft.code,
                        "soft error in a transport-successful response; treating as failed"
                    );
                    notify(progress, JobStatus::Failed);
                    return Ok(JobResult::failed_with(soft, payload));
                }
                let status = handle.job_type.status_from_payload(&payload);
                notify(progress, status);
                match status {
                    JobStatus::Succeeded => {
                        debug!(task_id = %handle.task_id, "task succeeded");
                        return Ok(JobResult::resolve(handle.job_type, payload));
                    }
                    JobStatus::Failed => {
                        return Ok(JobResult::failed(payload));
                    }
                    JobStatus::Unknown => {
                        warn!(
                            task_id = %handle.task_id,
                            "status missing or unrecognized; continuing to poll"
                        );
                    }
                    pending => {
                        debug!(task_id = %handle.task_id, status = ?pending, "task pending");
                    }
                }
            }
            Err(Error::Transport(message)) => {
                // The query is read-only, so a transport failure is safe
                // to retry until the deadline
                warn!(
                    task_id = %handle.task_id,
                    %message,
                    "status query transport failure; will retry"
                );
            }
            Err(Error::ProviderFailure { code, message }) => {
                // Envelope-level soft error surfaced by the client
                notify(progress, JobStatus::Failed);
                return Ok(JobResult::failed_with(
                    crate::models::ProviderError {
                        code: code.clone(),
                        message: message.clone(),
                    },
                    json!({"code": code, "message": message}),
                ));
            }
            Err(other) => return Err(other),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled {
                    task_id: handle.task_id.clone(),
                });
            }
            _ = tokio::time::sleep(options.interval) => {}
        }

        if started.elapsed() >= options.timeout {
            return Err(Error::PollTimeout {
                task_id: handle.task_id.clone(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
    }
}

fn notify(progress: Option<&watch::Sender<JobStatus>>, status: JobStatus) {
    if let Some(sender) = progress {
        // Receivers may have gone away; tracking continues regardless
        let _ = sender.send(status);
    }
}
