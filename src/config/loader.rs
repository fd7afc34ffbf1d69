// Configuration loader
//
// Parses the engine TOML and validates it. A malformed file here is a
// deployment error and is surfaced as a fatal startup failure, unlike the
// per-record errors in the engine taxonomy.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::settings::EngineConfig;

/// Load and validate engine settings from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read engine config: {}", path.display()))?;
    from_toml_str(&contents)
        .with_context(|| format!("Invalid engine config: {}", path.display()))
}

pub fn from_toml_str(contents: &str) -> Result<EngineConfig> {
    let config: EngineConfig =
        toml::from_str(contents).context("Failed to parse engine config TOML")?;
    config.validate()?;
    Ok(config)
}
