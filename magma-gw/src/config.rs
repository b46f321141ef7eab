//! Credential and storage-settings resolution
//!
//! Builds a validated [`CredentialSet`] per job submission from the
//! configuration snapshot, with store → environment priority. A missing
//! or empty secret is a hard failure naming the exact setting to fix;
//! nothing empty ever reaches the network layer.

use magma_common::config::{categories, resolve_value, ConfigStore};
use magma_common::{CredentialSet, Error, Result};

use crate::models::{JobType, ProviderFamily};

pub const ENV_ARK_API_KEY: &str = "MAGMA_ARK_API_KEY";
pub const ENV_ACCESS_KEY_ID: &str = "MAGMA_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "MAGMA_SECRET_ACCESS_KEY";
pub const ENV_TTS_APP_ID: &str = "MAGMA_TTS_APP_ID";
pub const ENV_TTS_ACCESS_TOKEN: &str = "MAGMA_TTS_ACCESS_TOKEN";
pub const ENV_TOS_BUCKET: &str = "MAGMA_TOS_BUCKET";
pub const ENV_TOS_REGION: &str = "MAGMA_TOS_REGION";
pub const ENV_TOS_ACCESS_KEY: &str = "MAGMA_TOS_ACCESS_KEY";
pub const ENV_TOS_SECRET_KEY: &str = "MAGMA_TOS_SECRET_KEY";

/// Resolve the credential shape a job type requires
pub fn resolve_credentials(
    job_type: JobType,
    store: &dyn ConfigStore,
) -> Result<CredentialSet> {
    match job_type.family() {
        ProviderFamily::Ark => {
            let api_key = required(
                store,
                categories::VOLCANO_ARK,
                "volcano_ark_api_key",
                ENV_ARK_API_KEY,
                "api_key",
            )?;
            CredentialSet::bearer(api_key)
        }
        ProviderFamily::Visual => {
            let access_key_id = required(
                store,
                categories::VOLCANO_ENGINE,
                "volcano_engine_access_key",
                ENV_ACCESS_KEY_ID,
                "access_key_id",
            )?;
            let secret_access_key = required(
                store,
                categories::VOLCANO_ENGINE,
                "volcano_engine_secret_key",
                ENV_SECRET_ACCESS_KEY,
                "secret_access_key",
            )?;
            CredentialSet::access_keys(access_key_id, secret_access_key)
        }
        ProviderFamily::Speech => {
            let app_id = required(
                store,
                categories::VOLCANO_TTS,
                "volcano_tts_app_id",
                ENV_TTS_APP_ID,
                "app_id",
            )?;
            let access_token = required(
                store,
                categories::VOLCANO_TTS,
                "volcano_tts_access_token",
                ENV_TTS_ACCESS_TOKEN,
                "access_token",
            )?;
            CredentialSet::speech(app_id, access_token)
        }
    }
}

/// Object-storage settings for the uploader
///
/// Absent entries resolve to empty strings so the uploader can report the
/// first missing field in its fixed precedence order.
#[derive(Debug, Clone, Default)]
pub struct TosSettings {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub fn resolve_tos_settings(store: &dyn ConfigStore) -> TosSettings {
    TosSettings {
        bucket: resolve_value(store, categories::TOS, "tos_bucket_name", ENV_TOS_BUCKET)
            .unwrap_or_default(),
        region: resolve_value(store, categories::TOS, "tos_region", ENV_TOS_REGION)
            .unwrap_or_default(),
        access_key_id: resolve_value(store, categories::TOS, "tos_access_key", ENV_TOS_ACCESS_KEY)
            .unwrap_or_default(),
        secret_access_key: resolve_value(
            store,
            categories::TOS,
            "tos_secret_key",
            ENV_TOS_SECRET_KEY,
        )
        .unwrap_or_default(),
    }
}

fn required(
    store: &dyn ConfigStore,
    category: &str,
    key: &str,
    env_var: &str,
    field: &'static str,
) -> Result<String> {
    resolve_value(store, category, key, env_var).ok_or_else(|| Error::MissingCredential {
        field,
        hint: format!(
            "set {category}.{key} in the configuration store or export {env_var}"
        ),
    })
}
