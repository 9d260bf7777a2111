//! CLI configuration loading and merging.

use anyhow::{Context, Result};
use lossreplay::ReplayConfig;
use std::path::Path;

/// Load and merge replay configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (applied by the caller)
/// 2. Environment variables
/// 3. File given with `--config`
/// 4. Local config file (./.lossreplayrc)
/// 5. Global config file (~/.lossreplay/config.toml)
/// 6. Defaults
pub fn load_config(explicit: Option<&Path>) -> Result<ReplayConfig> {
    let mut config = ReplayConfig::discover_and_load();

    if let Some(path) = explicit {
        let file = ReplayConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.merge(&file);
    }

    config.apply_env().context("Invalid environment configuration")?;
    Ok(config)
}
