//! `sidekick prompts`: Inspect the prompt registry.

use super::load_config;
use sidekick_prompts::{PromptDefinition, PromptRegistry};
use std::path::Path;

fn registry(config_path: Option<&Path>) -> Result<PromptRegistry, Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(PromptRegistry::load(config.prompts.registry_path.as_deref())?)
}

pub fn list(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry(config_path)?;
    println!("  {} prompt(s)", registry.len());
    println!();
    for prompt in registry.list() {
        println!("  {}", summary_line(prompt));
    }
    Ok(())
}

pub fn show(
    config_path: Option<&Path>,
    id: &str,
    version: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry(config_path)?;
    let prompt = match version {
        Some(v) => registry.get(id, v)?,
        None => registry
            .latest(id)
            .ok_or_else(|| format!("No prompt registered with id '{id}'"))?,
    };

    println!("  Prompt:   {}", prompt.key());
    if let Some(description) = &prompt.description {
        println!("  About:    {description}");
    }
    println!("  Inputs:   {}", serde_json::to_string(&prompt.inputs_schema)?);
    println!();
    println!("{}", prompt.template);
    Ok(())
}

fn summary_line(prompt: &PromptDefinition) -> String {
    match &prompt.description {
        Some(description) => format!("{:<28} {description}", prompt.key()),
        None => prompt.key(),
    }
}
