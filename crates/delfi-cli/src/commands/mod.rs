//! CLI command implementations for the Delfi query gateway.

pub mod ask;
pub mod check;
pub mod schema;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use delfi_core::GatewayConfig;

/// Load and cross-check the gateway configuration.
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let config = GatewayConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}
