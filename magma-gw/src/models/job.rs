//! Job model: types, handles, statuses, and the per-type schema registry
//!
//! Every supported generation job is a [`JobType`] variant carrying its
//! fixed provider identity (endpoint family, request key, status and
//! result field conventions). The near-duplicate submit/query paths of
//! the provider API are collapsed into this one registry; the normalizer,
//! submission gateway, poller, and result resolver are all parameterized
//! by it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider endpoint family, which also determines the credential shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// Ark endpoints, bearer API key
    Ark,
    /// Visual (CV) endpoints, signed access-key pair
    Visual,
    /// Speech synthesis, app id + access token
    Speech,
}

/// Supported generation job types
///
/// `JimengImageV31` and `JimengI2iV30` are legacy aliases: they submit,
/// poll, and resolve through the `JimengImage` schema so a single schema
/// change propagates to all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Ark Seedream image generation (synchronous)
    SeedreamImage,
    /// Ark video generation task (asynchronous)
    ArkVideo,
    /// Jimeng 4.0 text/image-to-image (canonical image schema)
    JimengImage,
    /// Jimeng 3.1 (legacy alias of `JimengImage`)
    #[serde(rename = "jimeng_image_v31")]
    JimengImageV31,
    /// Jimeng image-to-image 3.0 (legacy alias of `JimengImage`)
    #[serde(rename = "jimeng_i2i_v30")]
    JimengI2iV30,
    /// Jimeng 3.0 Pro text/image-to-video
    JimengVideoPro,
    /// Classic realman motion imitation
    MotionImitationClassic,
    /// Jimeng motion imitation
    MotionImitationJimeng,
    /// OmniHuman digital-human video
    OmniHumanVideo,
    /// Visual inpainting (synchronous CVProcess)
    Inpainting,
    /// Seedance video editing
    VideoEdit,
    /// Speech synthesis (synchronous)
    TextToSpeech,
}

impl JobType {
    /// All variants, alias entries included
    pub const ALL: &'static [JobType] = &[
        JobType::SeedreamImage,
        JobType::ArkVideo,
        JobType::JimengImage,
        JobType::JimengImageV31,
        JobType::JimengI2iV30,
        JobType::JimengVideoPro,
        JobType::MotionImitationClassic,
        JobType::MotionImitationJimeng,
        JobType::OmniHumanVideo,
        JobType::Inpainting,
        JobType::VideoEdit,
        JobType::TextToSpeech,
    ];

    /// Canonical type whose schema this type submits and polls through
    pub fn canonical(self) -> JobType {
        match self {
            JobType::JimengImageV31 | JobType::JimengI2iV30 => JobType::JimengImage,
            other => other,
        }
    }

    pub fn family(self) -> ProviderFamily {
        match self.canonical() {
            JobType::SeedreamImage | JobType::ArkVideo => ProviderFamily::Ark,
            JobType::TextToSpeech => ProviderFamily::Speech,
            _ => ProviderFamily::Visual,
        }
    }

    /// Fixed provider request key (Visual family only)
    ///
    /// Never caller-overridable: the normalizer discards any `req_key`
    /// supplied in user parameters.
    pub fn req_key(self) -> Option<&'static str> {
        match self.canonical() {
            JobType::JimengImage => Some("jimeng_t2i_v40"),
            JobType::JimengVideoPro => Some("jimeng_ti2v_v30_pro"),
            JobType::MotionImitationClassic => Some("realman_avatar_imitator_v2v_gen_video"),
            JobType::MotionImitationJimeng => Some("jimeng_imitator_ii2v"),
            JobType::OmniHumanVideo => {
                Some("jimeng_realman_avatar_picture_create_video_omni_v15")
            }
            JobType::Inpainting => Some("i2i_inpainting"),
            JobType::VideoEdit => Some("dm_seedance_videoedit_tob"),
            _ => None,
        }
    }

    /// True for types whose submission already carries the terminal result
    pub fn is_synchronous(self) -> bool {
        matches!(
            self.canonical(),
            JobType::SeedreamImage | JobType::Inpainting | JobType::TextToSpeech
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SeedreamImage => "seedream_image",
            JobType::ArkVideo => "ark_video",
            JobType::JimengImage => "jimeng_image",
            JobType::JimengImageV31 => "jimeng_image_v31",
            JobType::JimengI2iV30 => "jimeng_i2i_v30",
            JobType::JimengVideoPro => "jimeng_video_pro",
            JobType::MotionImitationClassic => "motion_imitation_classic",
            JobType::MotionImitationJimeng => "motion_imitation_jimeng",
            JobType::OmniHumanVideo => "omni_human_video",
            JobType::Inpainting => "inpainting",
            JobType::VideoEdit => "video_edit",
            JobType::TextToSpeech => "text_to_speech",
        }
    }

    /// Map a terminal-or-not provider payload to a job status
    ///
    /// The payload is the per-type data object returned by a status query.
    /// A missing or unrecognized status field maps to [`JobStatus::Unknown`],
    /// which is never terminal.
    pub fn status_from_payload(self, payload: &Value) -> JobStatus {
        let status = payload.get("status").and_then(Value::as_str);
        match self.family() {
            ProviderFamily::Visual => match status {
                Some("in_queue") => JobStatus::Submitted,
                Some("generating") => JobStatus::Processing,
                Some("done") => JobStatus::Succeeded,
                Some("not_found") | Some("expired") => JobStatus::Failed,
                _ => JobStatus::Unknown,
            },
            ProviderFamily::Ark => match status {
                Some("queued") => JobStatus::Submitted,
                Some("running") => JobStatus::Processing,
                Some("succeeded") => JobStatus::Succeeded,
                Some("failed") | Some("cancelled") => JobStatus::Failed,
                _ => JobStatus::Unknown,
            },
            // Speech synthesis never reaches the poller
            ProviderFamily::Speech => JobStatus::Unknown,
        }
    }

    /// Detect a soft error embedded in a transport-successful query payload
    ///
    /// Video editing queries carry an `error_code` field where `"10000"`
    /// means success; any other value is a terminal failure even though the
    /// HTTP layer and the response envelope both reported success.
    pub fn soft_error(self, payload: &Value) -> Option<ProviderError> {
        if self.canonical() != JobType::VideoEdit {
            return None;
        }
        let code = payload.get("error_code").and_then(Value::as_str)?;
        if code == "10000" {
            return None;
        }
        Some(ProviderError {
            code: code.to_string(),
            message: payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("provider reported an error")
                .to_string(),
        })
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable lifecycle of one job
///
/// `Unknown` covers provider responses lacking a recognizable status field;
/// it is logged and polling continues; it is never a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Succeeded,
    Failed,
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Provider-assigned task identifier plus the job type that produced it
///
/// Polling must re-send the type's request key, which the bare identifier
/// does not encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub task_id: String,
    pub job_type: JobType,
}

impl JobHandle {
    pub fn new(task_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            task_id: task_id.into(),
            job_type,
        }
    }
}

/// User-facing job submission input
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub job_type: JobType,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

/// Structured failure reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_share_the_canonical_schema() {
        assert_eq!(JobType::JimengImageV31.canonical(), JobType::JimengImage);
        assert_eq!(JobType::JimengI2iV30.canonical(), JobType::JimengImage);
        assert_eq!(
            JobType::JimengImageV31.req_key(),
            JobType::JimengImage.req_key()
        );
    }

    #[test]
    fn req_keys_are_fixed_per_type() {
        assert_eq!(JobType::JimengImage.req_key(), Some("jimeng_t2i_v40"));
        assert_eq!(
            JobType::VideoEdit.req_key(),
            Some("dm_seedance_videoedit_tob")
        );
        assert_eq!(JobType::SeedreamImage.req_key(), None);
    }

    #[test]
    fn visual_status_mapping() {
        let t = JobType::JimengImage;
        assert_eq!(
            t.status_from_payload(&json!({"status": "in_queue"})),
            JobStatus::Submitted
        );
        assert_eq!(
            t.status_from_payload(&json!({"status": "generating"})),
            JobStatus::Processing
        );
        assert_eq!(
            t.status_from_payload(&json!({"status": "done"})),
            JobStatus::Succeeded
        );
    }

    #[test]
    fn missing_status_field_is_unknown_not_terminal() {
        let status = JobType::JimengVideoPro.status_from_payload(&json!({"progress": 42}));
        assert_eq!(status, JobStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn unrecognized_status_value_is_unknown() {
        let status = JobType::ArkVideo.status_from_payload(&json!({"status": "warming_up"}));
        assert_eq!(status, JobStatus::Unknown);
    }

    #[test]
    fn video_edit_soft_error_detected() {
        let err = JobType::VideoEdit
            .soft_error(&json!({"error_code": "50412", "message": "content rejected"}))
            .expect("soft error");
        assert_eq!(err.code, "50412");
        assert_eq!(err.message, "content rejected");
    }

    #[test]
    fn video_edit_success_code_is_not_an_error() {
        assert!(JobType::VideoEdit
            .soft_error(&json!({"error_code": "10000", "status": "done"}))
            .is_none());
    }

    #[test]
    fn soft_error_only_applies_to_video_edit() {
        assert!(JobType::JimengImage
            .soft_error(&json!({"error_code": "50412"}))
            .is_none());
    }

    #[test]
    fn registry_is_internally_consistent() {
        for &job_type in JobType::ALL {
            let canonical = job_type.canonical();
            // Canonicalization is idempotent and preserves the family
            assert_eq!(canonical.canonical(), canonical);
            assert_eq!(job_type.family(), canonical.family());
            // Visual types carry a fixed request key; the others never do
            match job_type.family() {
                ProviderFamily::Visual => assert!(job_type.req_key().is_some(), "{job_type}"),
                _ => assert!(job_type.req_key().is_none(), "{job_type}"),
            }
        }
    }

    #[test]
    fn job_type_serde_names_are_stable() {
        let parsed: JobType = serde_json::from_str("\"jimeng_image_v31\"").unwrap();
        assert_eq!(parsed, JobType::JimengImageV31);
        assert_eq!(
            serde_json::to_string(&JobType::MotionImitationClassic).unwrap(),
            "\"motion_imitation_classic\""
        );
    }
}
