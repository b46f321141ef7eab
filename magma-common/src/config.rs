//! Configuration store contract and TOML loading
//!
//! The gateway never owns configuration CRUD; it reads a snapshot through
//! the narrow [`ConfigStore`] contract. Resolution priority for any value
//! is store → environment variable, with a warning when both are set.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration category names, following the provider-family grouping
/// of the configuration catalog
pub mod categories {
    /// Ark endpoints (bearer API key)
    pub const VOLCANO_ARK: &str = "volcano_ark";
    /// Visual endpoints (access-key pair)
    pub const VOLCANO_ENGINE: &str = "volcano_engine";
    /// Speech synthesis (app id + access token)
    pub const VOLCANO_TTS: &str = "volcano_tts";
    /// Object storage
    pub const TOS: &str = "tos";
    /// Uncategorized settings
    pub const GENERAL: &str = "general";
}

/// Read-only configuration snapshot
///
/// Disabled entries must be reported as absent; the orchestrator treats
/// missing and disabled identically.
pub trait ConfigStore: Send + Sync {
    fn get(&self, category: &str, key: &str) -> Option<String>;
}

/// In-memory [`ConfigStore`] backed by a category → key → value map,
/// typically loaded from the gateway TOML file
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    entries: HashMap<(String, String), String>,
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        category: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.entries.insert((category.into(), key.into()), value.into());
    }

    pub fn from_toml(config: &TomlConfig) -> Self {
        let mut store = Self::new();
        for (category, keys) in &config.configs {
            for (key, value) in keys {
                store.insert(category.clone(), key.clone(), value.clone());
            }
        }
        store
    }
}

impl ConfigStore for StaticConfigStore {
    fn get(&self, category: &str, key: &str) -> Option<String> {
        self.entries
            .get(&(category.to_string(), key.to_string()))
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Gateway TOML configuration file
///
/// ```toml
/// listen_addr = "127.0.0.1:5740"
///
/// [configs.volcano_engine]
/// volcano_engine_access_key = "AKLT..."
/// volcano_engine_secret_key = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Socket address for the HTTP surface
    pub listen_addr: Option<String>,
    /// Credential/config entries, category → key → value
    #[serde(default)]
    pub configs: HashMap<String, HashMap<String, String>>,
}

/// Load the TOML configuration from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default configuration file path: `~/.config/magma/magma-gw.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("magma").join("magma-gw.toml"))
}

/// Resolve one value with store → environment priority
///
/// Both the store entry and the environment variable are trimmed; empty
/// values count as absent. When both sources are set a warning names them,
/// since a stale environment override is a common misconfiguration.
pub fn resolve_value(
    store: &dyn ConfigStore,
    category: &str,
    key: &str,
    env_var: &str,
) -> Option<String> {
    let store_value = store
        .get(category, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let env_value = std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    if store_value.is_some() && env_value.is_some() {
        warn!(
            category,
            key, env_var, "value set in both config store and environment; using store"
        );
    }

    store_value.or(env_value)
}
