//! Data model for the job orchestration core

pub mod job;
pub mod result;
pub mod schema;

pub use job::{JobHandle, JobRequest, JobStatus, JobType, ProviderError, ProviderFamily};
pub use result::JobResult;
pub use schema::normalize;
