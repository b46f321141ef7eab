//! Poller state-machine tests against scripted providers
//!
//! Time is virtual (`start_paused`), so the multi-minute scenarios run
//! instantly while keeping their real interval/timeout arithmetic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use magma_common::Error;
use magma_gw::models::{JobHandle, JobStatus, JobType};
use magma_gw::services::{poll_until_terminal, PollOptions, TaskQuery};

/// Provider fake that replays a fixed script, repeating its last entry
struct ScriptedProvider {
    script: Mutex<Vec<Value>>,
    queries: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(script),
            queries: AtomicUsize::new(0),
        }
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskQuery for ScriptedProvider {
    async fn query_status(&self, _handle: &JobHandle) -> Result<Value, Error> {
        let index = self.queries.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        Ok(script[index.min(script.len() - 1)].clone())
    }
}

/// Provider fake that stays in `generating` until the Nth query
struct SlowProvider {
    done_after: usize,
    queries: AtomicUsize,
}

#[async_trait]
impl TaskQuery for SlowProvider {
    async fn query_status(&self, _handle: &JobHandle) -> Result<Value, Error> {
        let index = self.queries.fetch_add(1, Ordering::SeqCst);
        if index + 1 >= self.done_after {
            Ok(json!({"status": "done", "video_url": "https://cdn/final.mp4"}))
        } else {
            Ok(json!({"status": "generating"}))
        }
    }
}

fn options(interval_secs: u64, timeout_secs: u64) -> PollOptions {
    PollOptions {
        interval: Duration::from_secs(interval_secs),
        timeout: Duration::from_secs(timeout_secs),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_status_is_swallowed_and_polling_continues() {
    // First response has no status field at all; two seconds later the
    // task reports done with its artifact list
    let provider = ScriptedProvider::new(vec![
        json!({"progress": "queued somewhere"}),
        json!({"status": "done", "image_urls": ["https://cdn/out.png"]}),
    ]);
    let handle = JobHandle::new("t-100", JobType::JimengImage);

    let result = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .expect("terminal result");

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.artifact_urls, vec!["https://cdn/out.png"]);
    assert_eq!(provider.query_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn poller_never_returns_unknown() {
    // Unknown forever: the loop must end in PollTimeout, not Unknown
    let provider = ScriptedProvider::new(vec![json!({"nonsense": true})]);
    let handle = JobHandle::new("t-101", JobType::OmniHumanVideo);

    let err = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 20),
        &CancellationToken::new(),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::PollTimeout { .. }), "{err}");
}

#[tokio::test(start_paused = true)]
async fn soft_error_is_terminal_failed_not_processing() {
    // HTTP and envelope both succeeded, but the embedded error code says
    // otherwise
    let provider = ScriptedProvider::new(vec![
        json!({"status": "generating", "error_code": "50412", "message": "frame rejected"}),
    ]);
    let handle = JobHandle::new("t-102", JobType::VideoEdit);

    let result = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .expect("terminal result");

    assert_eq!(result.status, JobStatus::Failed);
    let error = result.error.expect("soft error surfaced");
    assert_eq!(error.code, "50412");
    assert_eq!(provider.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_failure_payload_maps_to_failed_result() {
    let provider = ScriptedProvider::new(vec![
        json!({"status": "failed", "error": {"code": "InternalError", "message": "worker died"}}),
    ]);
    let handle = JobHandle::new("t-103", JobType::ArkVideo);

    let result = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .expect("terminal result");

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.error.unwrap().code, "InternalError");
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_the_handle_valid_for_repolling() {
    let provider = SlowProvider {
        done_after: 35,
        queries: AtomicUsize::new(0),
    };
    let handle = JobHandle::new("t-104", JobType::JimengVideoPro);

    // 60 seconds of Processing at a 2-second interval: deadline exceeded
    let err = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .unwrap_err();
    match &err {
        Error::PollTimeout { task_id, waited_secs } => {
            assert_eq!(task_id, "t-104");
            assert!(*waited_secs >= 60);
        }
        other => panic!("expected PollTimeout, got {other}"),
    }

    // Same handle, same provider task: a later poll run succeeds
    let result = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .expect("re-poll reaches terminal state");
    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.artifact_urls, vec!["https://cdn/final.mp4"]);
}

#[tokio::test(start_paused = true)]
async fn alias_handles_poll_through_the_canonical_schema() {
    let provider = ScriptedProvider::new(vec![
        json!({"status": "in_queue"}),
        json!({"status": "done", "image_urls": ["https://cdn/legacy.png"]}),
    ]);
    let handle = JobHandle::new("t-105", JobType::JimengI2iV30);

    let result = poll_until_terminal(
        &provider,
        &handle,
        &options(2, 60),
        &CancellationToken::new(),
        None,
    )
    .await
    .expect("terminal result");
    assert_eq!(result.artifact_urls, vec!["https://cdn/legacy.png"]);
}
