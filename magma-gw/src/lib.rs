//! magma-gw library interface
//!
//! Exposes the job orchestration core (models, provider clients, poller)
//! and the HTTP surface for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use magma_common::config::ConfigStore;
use magma_common::Result;

use crate::models::{JobHandle, JobResult, JobStatus};
use crate::services::{JobClient, TosUploader};

/// Terminal outcome slot for a tracked polling loop
#[derive(Debug, Clone)]
pub enum TrackedOutcome {
    Finished(JobResult),
    Error(String),
}

/// One spawned polling loop
///
/// Each entry owns its own cancellation token and status channel; tracked
/// jobs share nothing mutable with each other.
#[derive(Clone)]
pub struct TrackedJob {
    pub handle: JobHandle,
    pub cancel: CancellationToken,
    pub status_rx: watch::Receiver<JobStatus>,
    pub outcome: Arc<RwLock<Option<TrackedOutcome>>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration snapshot (collaborator; never owned or mutated here)
    pub config_store: Arc<dyn ConfigStore>,
    /// Provider client bundle
    pub jobs: Arc<JobClient>,
    /// Object-storage uploader
    pub uploader: Arc<TosUploader>,
    /// Cancellation tokens and status channels for tracked polling loops
    pub tracked: Arc<RwLock<HashMap<Uuid, TrackedJob>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config_store: Arc<dyn ConfigStore>) -> Result<Self> {
        Ok(Self {
            config_store,
            jobs: Arc::new(JobClient::new()?),
            uploader: Arc::new(TosUploader::new()?),
            tracked: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::job_routes())
        .merge(api::upload_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
