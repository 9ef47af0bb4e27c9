//! Subcommand implementations.

pub mod chat;
pub mod config_cmd;
pub mod prompts;
pub mod runtime;
pub mod tools;

use sidekick_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load the config from `path` (or the default location), apply
/// environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
