//! magma-gw - Generation Gateway Service
//!
//! Submits generative-media jobs to the provider, tracks their
//! asynchronous completion, and uploads auxiliary artifacts to object
//! storage so they can be referenced by URL.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use magma_common::config::{self, StaticConfigStore, TomlConfig};
use magma_gw::AppState;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5740";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting magma-gw (Generation Gateway) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Configuration: explicit path via MAGMA_CONFIG, else the platform
    // default; a missing file just means an empty store (credentials can
    // still arrive per-request or from the environment)
    let config_path = std::env::var("MAGMA_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) if path.exists() => {
            info!("Config: {}", path.display());
            config::load_toml_config(path)?
        }
        _ => {
            info!("No config file found; starting with an empty config store");
            TomlConfig::default()
        }
    };

    let store = Arc::new(StaticConfigStore::from_toml(&toml_config));
    let state = AppState::new(store)?;
    let app = magma_gw::build_router(state);

    let addr = toml_config
        .listen_addr
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
