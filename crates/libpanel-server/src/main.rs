//! libpanel Server Binary
//!
//! Standalone server for the library element API.

use std::sync::Arc;

use libpanel_core::LibPanelConfig;
use libpanel_server::{serve, AppState};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "libpanel_server=info,libpanel_core=info";

fn load_config() -> Result<LibPanelConfig, Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("LIBPANEL_CONFIG") {
        tracing::info!("Loading config from {}", path);
        return Ok(LibPanelConfig::load(&path)?);
    }
    match LibPanelConfig::default_path() {
        Some(path) if path.exists() => {
            tracing::info!("Loading config from {:?}", path);
            Ok(LibPanelConfig::load(&path)?)
        }
        _ => Ok(LibPanelConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let mut config = load_config()?;
    if let Ok(addr) = std::env::var("LIBPANEL_ADDR") {
        config.server.addr = addr;
    }

    let state = Arc::new(AppState::from_config(&config)?);
    serve(&config.server.addr, state).await
}
