//! Provider clients and orchestration services

pub mod ark_client;
pub mod gateway;
pub mod job_tracker;
pub mod signature;
pub mod speech_client;
pub mod tos_uploader;
pub mod visual_client;

pub use ark_client::{ArkClient, TaskListQuery};
pub use gateway::{JobClient, SubmitOutcome};
pub use job_tracker::{poll_until_terminal, PollOptions, TaskQuery};
pub use signature::RequestSigner;
pub use speech_client::SpeechClient;
pub use tos_uploader::{TosUploader, UploadedArtifact};
pub use visual_client::VisualClient;
