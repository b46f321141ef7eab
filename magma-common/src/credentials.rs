//! Credential types for provider calls
//!
//! Credentials are built once per call from the configuration snapshot and
//! passed by value; they are never persisted by the orchestrator. Invalid
//! shapes are rejected at construction, not at point of use.

use crate::{Error, Result};

/// Authentication material for one provider call
///
/// The shape is selected by the job type's provider family: Ark endpoints
/// take a bearer API key, Visual/TOS endpoints take an access-key pair,
/// and speech synthesis takes an app id plus access token.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSet {
    /// Bearer API key (Ark image/video endpoints)
    Bearer { api_key: String },
    /// Access-key pair for signed requests (Visual and TOS endpoints)
    AccessKeys {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Speech-service app credentials
    Speech { app_id: String, access_token: String },
}

impl CredentialSet {
    pub fn bearer(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        require_non_empty(&api_key, "api_key", "configure volcano_ark.volcano_ark_api_key")?;
        Ok(CredentialSet::Bearer { api_key })
    }

    pub fn access_keys(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        require_non_empty(
            &access_key_id,
            "access_key_id",
            "configure volcano_engine.volcano_engine_access_key",
        )?;
        require_non_empty(
            &secret_access_key,
            "secret_access_key",
            "configure volcano_engine.volcano_engine_secret_key",
        )?;
        Ok(CredentialSet::AccessKeys {
            access_key_id,
            secret_access_key,
        })
    }

    pub fn speech(app_id: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        let access_token = access_token.into();
        require_non_empty(&app_id, "app_id", "configure volcano_tts.volcano_tts_app_id")?;
        require_non_empty(
            &access_token,
            "access_token",
            "configure volcano_tts.volcano_tts_access_token",
        )?;
        Ok(CredentialSet::Speech {
            app_id,
            access_token,
        })
    }
}

fn require_non_empty(value: &str, field: &'static str, hint: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingCredential {
            field,
            hint: hint.to_string(),
        });
    }
    Ok(())
}

/// Mask a secret for log output, keeping just enough to correlate
pub fn mask(secret: &str) -> String {
    if secret.len() > 14 {
        format!("{}...{}", &secret[..10], &secret[secret.len() - 4..])
    } else {
        "*".repeat(secret.len())
    }
}

// Secrets never appear in Debug output
impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSet::Bearer { api_key } => f
                .debug_struct("Bearer")
                .field("api_key", &mask(api_key))
                .finish(),
            CredentialSet::AccessKeys { access_key_id, .. } => f
                .debug_struct("AccessKeys")
                .field("access_key_id", &mask(access_key_id))
                .field("secret_access_key", &"****")
                .finish(),
            CredentialSet::Speech { app_id, .. } => f
                .debug_struct("Speech")
                .field("app_id", &app_id)
                .field("access_token", &"****")
                .finish(),
        }
    }
}
