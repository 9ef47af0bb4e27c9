//! `sidekick config`: Configuration management commands.

use super::load_config;
use sidekick_config::{AppConfig, SinkKind};
use std::path::{Path, PathBuf};

fn config_file(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Soft issues that do not fail validation but are worth surfacing.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.model.embedding_model.is_none() {
        warnings.push("No embedding model set; memory uses the local hash embedder".to_string());
    }
    if config.telemetry.enabled && config.telemetry.sink == SinkKind::Jsonl && !config.telemetry.redact {
        warnings.push("Telemetry writes to disk without redaction".to_string());
    }
    if config.agent.max_iterations == 1 {
        warnings.push("agent.max_iterations = 1 leaves no room for tool results".to_string());
    }
    if let Some(path) = &config.prompts.registry_path
        && !path.exists()
    {
        warnings.push(format!("Prompt registry {} does not exist", path.display()));
    }

    warnings
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Server:     {}", config.model.base_url);
            println!("   Model:      {}", config.model.model);
            println!("   Device:     {:?}", config.context.device_tier);
            println!("   Iterations: {}", config.agent.max_iterations);
            println!("   History:    {} entries", config.memory.history_capacity);
            println!("   Telemetry:  {:?}", config.telemetry.sink);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.model.api_key.is_some() {
        config.model.api_key = Some("[redacted]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

pub fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_file(config_path);
    if path.exists() {
        println!("   Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("   ✅ Wrote default config to {}", path.display());
    Ok(())
}
