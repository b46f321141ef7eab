//! Request normalization
//!
//! Maps the user-supplied parameter map of each job type into the
//! provider's submission payload. The request key is injected from the
//! type registry and is never caller-overridable. Declared optional
//! fields travel only when present and non-default (a `-1` seed means
//! "omit", a non-positive scale is never sent); unknown fields pass
//! through opaquely. Legacy alias types delegate to their canonical
//! schema, so the alias payload is byte-identical to the canonical one.

use magma_common::{Error, Result};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::job::JobType;

/// Inclusion policy for a declared optional field
#[derive(Debug, Clone, Copy)]
enum FieldPolicy {
    /// Include when present and non-empty
    Copy,
    /// Omit when equal to the -1 "let the provider choose" sentinel
    SeedSentinel,
    /// Omit unless strictly positive
    Positive,
}

struct JobSchema {
    required: &'static [&'static str],
    /// At least one of these must be present (empty slice disables the check)
    any_of: &'static [&'static str],
    optional: &'static [(&'static str, FieldPolicy)],
}

impl JobSchema {
    fn policy_for(&self, key: &str) -> Option<FieldPolicy> {
        self.optional
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, policy)| *policy)
    }
}

fn schema_for(job_type: JobType) -> JobSchema {
    use FieldPolicy::*;
    match job_type.canonical() {
        JobType::SeedreamImage => JobSchema {
            required: &["model", "prompt"],
            any_of: &[],
            optional: &[
                ("size", Copy),
                ("sequential_image_generation", Copy),
                ("sequential_image_generation_options", Copy),
                ("stream", Copy),
                ("response_format", Copy),
                ("watermark", Copy),
                ("guidance_scale", Positive),
                ("seed", SeedSentinel),
            ],
        },
        JobType::ArkVideo => JobSchema {
            required: &["model", "content"],
            any_of: &[],
            optional: &[("callback_url", Copy), ("return_last_frame", Copy)],
        },
        JobType::JimengImage => JobSchema {
            required: &["prompt"],
            any_of: &[],
            optional: &[
                ("image_urls", Copy),
                ("size", Copy),
                ("width", Copy),
                ("height", Copy),
                ("scale", Positive),
                ("force_single", Copy),
                ("min_ratio", Copy),
                ("max_ratio", Copy),
                ("seed", SeedSentinel),
            ],
        },
        JobType::JimengVideoPro => JobSchema {
            required: &[],
            any_of: &["prompt", "image_urls", "binary_data_base64"],
            optional: &[
                ("prompt", Copy),
                ("image_urls", Copy),
                ("binary_data_base64", Copy),
                ("seed", SeedSentinel),
                ("frames", Copy),
                ("aspect_ratio", Copy),
            ],
        },
        JobType::MotionImitationClassic => JobSchema {
            required: &["image_url", "driving_video_info"],
            any_of: &[],
            optional: &[],
        },
        JobType::MotionImitationJimeng => JobSchema {
            required: &["image_url", "video_url"],
            any_of: &[],
            optional: &[],
        },
        JobType::OmniHumanVideo => JobSchema {
            required: &["image_url", "audio_url"],
            any_of: &[],
            optional: &[
                ("mask_url", Copy),
                ("prompt", Copy),
                ("seed", SeedSentinel),
                ("pe_fast_mode", Copy),
            ],
        },
        JobType::Inpainting => JobSchema {
            required: &[],
            any_of: &["image_urls", "binary_data_base64"],
            optional: &[
                ("image_urls", Copy),
                ("binary_data_base64", Copy),
                ("custom_prompt", Copy),
                ("steps", Positive),
                ("scale", Positive),
                ("seed", SeedSentinel),
                ("return_url", Copy),
            ],
        },
        JobType::VideoEdit => JobSchema {
            required: &["prompt", "video_url"],
            any_of: &[],
            optional: &[("seed", SeedSentinel), ("max_frame", Copy)],
        },
        // Sections are assembled, not copied; see normalize_speech
        JobType::TextToSpeech => JobSchema {
            required: &["text"],
            any_of: &[],
            optional: &[],
        },
        // Aliases resolved by canonical() above
        JobType::JimengImageV31 | JobType::JimengI2iV30 => unreachable!(),
    }
}

/// Normalize user parameters into the provider submission payload
pub fn normalize(job_type: JobType, params: &Map<String, Value>) -> Result<Value> {
    let canonical = job_type.canonical();
    let schema = schema_for(canonical);

    for field in schema.required {
        if !has_value(params.get(*field)) {
            return Err(Error::Validation(format!(
                "field `{field}` is required for {canonical}"
            )));
        }
    }
    if !schema.any_of.is_empty() && !schema.any_of.iter().any(|f| has_value(params.get(*f))) {
        return Err(Error::Validation(format!(
            "one of `{}` is required for {canonical}",
            schema.any_of.join("`, `")
        )));
    }

    if canonical == JobType::TextToSpeech {
        return normalize_speech(params);
    }

    let mut body = Map::new();
    if let Some(req_key) = canonical.req_key() {
        body.insert("req_key".to_string(), Value::String(req_key.to_string()));
    }

    for (key, value) in params {
        if key == "req_key" || value.is_null() {
            continue;
        }
        match schema.policy_for(key) {
            Some(FieldPolicy::SeedSentinel) if value.as_i64() == Some(-1) => continue,
            Some(FieldPolicy::Positive)
                if value.as_f64().map(|v| v <= 0.0).unwrap_or(false) =>
            {
                continue
            }
            Some(_) if is_empty(value) => continue,
            _ => {}
        }
        body.insert(key.clone(), value.clone());
    }

    // Width and height only travel as a pair
    if canonical == JobType::JimengImage && (body.contains_key("width") ^ body.contains_key("height"))
    {
        body.remove("width");
        body.remove("height");
    }

    Ok(Value::Object(body))
}

/// Assemble the sectioned speech-synthesis payload
///
/// The `app` section (app id, access token, cluster) is injected by the
/// speech client at call time; credentials never enter normalization.
fn normalize_speech(params: &Map<String, Value>) -> Result<Value> {
    let text = params
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation("field `text` must be a string".to_string()))?;

    let mut audio = Map::new();
    audio.insert(
        "voice_type".to_string(),
        params
            .get("voice_type")
            .filter(|v| has_value(Some(v)))
            .cloned()
            .unwrap_or_else(|| Value::String("zh_female_cancan_mars_bigtts".to_string())),
    );
    audio.insert(
        "encoding".to_string(),
        params
            .get("encoding")
            .filter(|v| has_value(Some(v)))
            .cloned()
            .unwrap_or_else(|| Value::String("mp3".to_string())),
    );
    audio.insert(
        "speed_ratio".to_string(),
        params.get("speed_ratio").cloned().unwrap_or(Value::from(1.0)),
    );
    audio.insert(
        "rate".to_string(),
        params.get("rate").cloned().unwrap_or(Value::from(24000)),
    );
    audio.insert(
        "loudness_ratio".to_string(),
        params
            .get("loudness_ratio")
            .cloned()
            .unwrap_or(Value::from(1.0)),
    );
    if let Some(emotion) = params.get("emotion").filter(|v| has_value(Some(v))) {
        audio.insert("emotion".to_string(), emotion.clone());
        audio.insert("enable_emotion".to_string(), Value::Bool(true));
    }
    if let Some(language) = params
        .get("explicit_language")
        .filter(|v| has_value(Some(v)))
    {
        audio.insert("explicit_language".to_string(), language.clone());
    }

    let mut request = Map::new();
    request.insert(
        "reqid".to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );
    request.insert("text".to_string(), Value::String(text.to_string()));
    request.insert("operation".to_string(), Value::String("query".to_string()));
    if let Some(model) = params.get("model").filter(|v| has_value(Some(v))) {
        request.insert("model".to_string(), model.clone());
    }

    let mut user = Map::new();
    user.insert(
        "uid".to_string(),
        Value::String(format!("magma_{}", Uuid::new_v4().simple())),
    );

    let mut body = Map::new();
    body.insert("user".to_string(), Value::Object(user));
    body.insert("audio".to_string(), Value::Object(audio));
    body.insert("request".to_string(), Value::Object(request));
    Ok(Value::Object(body))
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(other) => !is_empty(other),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn sentinel_seed_is_omitted() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "a volcano at dusk", "seed": -1})),
        )
        .unwrap();
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn explicit_seed_is_included() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "a volcano at dusk", "seed": 42})),
        )
        .unwrap();
        assert_eq!(body["seed"], json!(42));
    }

    #[test]
    fn non_positive_scale_is_omitted() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "scale": 0.0})),
        )
        .unwrap();
        assert!(body.get("scale").is_none());

        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "scale": 3.5})),
        )
        .unwrap();
        assert_eq!(body["scale"], json!(3.5));
    }

    #[test]
    fn req_key_is_fixed_and_not_caller_overridable() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "req_key": "evil_key"})),
        )
        .unwrap();
        assert_eq!(body["req_key"], json!("jimeng_t2i_v40"));
    }

    #[test]
    fn aliases_normalize_byte_identically() {
        let input = params(json!({
            "prompt": "moss garden",
            "image_urls": ["https://example.com/a.png"],
            "scale": 4.0,
            "seed": -1
        }));
        let canonical = normalize(JobType::JimengImage, &input).unwrap();
        let v31 = normalize(JobType::JimengImageV31, &input).unwrap();
        let i2i = normalize(JobType::JimengI2iV30, &input).unwrap();
        assert_eq!(
            serde_json::to_vec(&canonical).unwrap(),
            serde_json::to_vec(&v31).unwrap()
        );
        assert_eq!(
            serde_json::to_vec(&canonical).unwrap(),
            serde_json::to_vec(&i2i).unwrap()
        );
    }

    #[test]
    fn missing_required_field_fails_before_any_network_call() {
        let err = normalize(JobType::VideoEdit, &params(json!({"prompt": "trim"}))).unwrap_err();
        assert!(err.to_string().contains("video_url"));
    }

    #[test]
    fn empty_required_string_counts_as_missing() {
        assert!(normalize(JobType::JimengImage, &params(json!({"prompt": ""}))).is_err());
    }

    #[test]
    fn video_needs_prompt_or_image() {
        assert!(normalize(JobType::JimengVideoPro, &params(json!({"frames": 121}))).is_err());
        let body = normalize(
            JobType::JimengVideoPro,
            &params(json!({"image_urls": ["https://example.com/f.png"], "seed": -1})),
        )
        .unwrap();
        assert_eq!(body["req_key"], json!("jimeng_ti2v_v30_pro"));
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn unknown_fields_pass_through_opaquely() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "logo_info": {"add_logo": true}})),
        )
        .unwrap();
        assert_eq!(body["logo_info"], json!({"add_logo": true}));
    }

    #[test]
    fn width_without_height_is_dropped() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "width": 1024})),
        )
        .unwrap();
        assert!(body.get("width").is_none());

        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "width": 1024, "height": 768})),
        )
        .unwrap();
        assert_eq!(body["width"], json!(1024));
        assert_eq!(body["height"], json!(768));
    }

    #[test]
    fn empty_image_list_is_omitted() {
        let body = normalize(
            JobType::JimengImage,
            &params(json!({"prompt": "p", "image_urls": []})),
        )
        .unwrap();
        assert!(body.get("image_urls").is_none());
    }

    #[test]
    fn speech_payload_is_sectioned_without_credentials() {
        let body = normalize(
            JobType::TextToSpeech,
            &params(json!({"text": "hello", "emotion": "happy", "model": "seed-tts-1.1"})),
        )
        .unwrap();
        assert!(body.get("app").is_none());
        assert_eq!(body["audio"]["encoding"], json!("mp3"));
        assert_eq!(body["audio"]["emotion"], json!("happy"));
        assert_eq!(body["audio"]["enable_emotion"], json!(true));
        assert_eq!(body["request"]["operation"], json!("query"));
        assert_eq!(body["request"]["model"], json!("seed-tts-1.1"));
        assert!(body["request"]["reqid"].as_str().is_some());
    }

    #[test]
    fn speech_defaults_apply_when_fields_absent() {
        let body = normalize(JobType::TextToSpeech, &params(json!({"text": "hi"}))).unwrap();
        assert_eq!(body["audio"]["voice_type"], json!("zh_female_cancan_mars_bigtts"));
        assert_eq!(body["audio"]["rate"], json!(24000));
        assert!(body["audio"].get("emotion").is_none());
    }

    #[test]
    fn motion_imitation_requires_both_inputs() {
        let err = normalize(
            JobType::MotionImitationJimeng,
            &params(json!({"image_url": "https://example.com/face.png"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("video_url"));
    }
}
