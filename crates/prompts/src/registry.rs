//! Prompt registry: immutable templates keyed by `id@version`.
//!
//! A built-in registry ships inside the crate. An external JSON file with
//! the same layout may add entries or override built-in ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sidekick_core::schema::check_schema;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::PromptError;
use crate::template::placeholders;

const BUILTIN_REGISTRY: &str = include_str!("../prompts/registry.json");

/// A versioned prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDefinition {
    pub id: String,
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema the render inputs must satisfy
    pub inputs_schema: Value,

    /// Text with `{{name}}` placeholders
    pub template: String,

    /// Version of the tool-description format this prompt expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_schema_version: Option<u32>,
}

impl PromptDefinition {
    pub fn key(&self) -> String {
        prompt_key(&self.id, self.version)
    }

    /// Reject schemas that cannot validate and placeholders the schema
    /// does not declare.
    fn check(&self) -> Result<(), PromptError> {
        check_schema(&self.inputs_schema)
            .map_err(|e| PromptError::Load(format!("{}: invalid inputs schema: {e}", self.key())))?;

        let declared = self
            .inputs_schema
            .get("properties")
            .and_then(Value::as_object);
        for name in placeholders(&self.template) {
            if !declared.is_some_and(|props| props.contains_key(&name)) {
                return Err(PromptError::Load(format!(
                    "{}: placeholder '{{{{{name}}}}}' is not declared in the inputs schema",
                    self.key()
                )));
            }
        }
        Ok(())
    }
}

pub fn prompt_key(id: &str, version: u32) -> String {
    format!("{id}@{version}")
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    prompts: Vec<PromptDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    prompts: BTreeMap<String, PromptDefinition>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry embedded in the crate.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_json(BUILTIN_REGISTRY)
    }

    /// The built-in registry, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, PromptError> {
        let mut registry = Self::builtin()?;
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .map_err(|e| PromptError::Load(format!("{}: {e}", path.display())))?;
            let overlay = Self::from_json(&text)?;
            debug!(path = %path.display(), prompts = overlay.len(), "Loaded prompt overlay");
            registry.merge(overlay);
        }
        Ok(registry)
    }

    pub fn from_json(text: &str) -> Result<Self, PromptError> {
        let file: RegistryFile =
            serde_json::from_str(text).map_err(|e| PromptError::Load(e.to_string()))?;
        let mut registry = Self::new();
        for prompt in file.prompts {
            let key = prompt.key();
            if registry.prompts.contains_key(&key) {
                return Err(PromptError::Load(format!("duplicate prompt {key}")));
            }
            registry.insert(prompt)?;
        }
        Ok(registry)
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, prompt: PromptDefinition) -> Result<(), PromptError> {
        prompt.check()?;
        self.prompts.insert(prompt.key(), prompt);
        Ok(())
    }

    /// Entries in `other` win over existing ones.
    pub fn merge(&mut self, other: PromptRegistry) {
        self.prompts.extend(other.prompts);
    }

    pub fn get(&self, id: &str, version: u32) -> Result<&PromptDefinition, PromptError> {
        self.prompts
            .get(&prompt_key(id, version))
            .ok_or_else(|| PromptError::NotFound {
                id: id.to_string(),
                version,
            })
    }

    /// The highest version registered for `id`.
    pub fn latest(&self, id: &str) -> Option<&PromptDefinition> {
        self.prompts
            .values()
            .filter(|p| p.id == id)
            .max_by_key(|p| p.version)
    }

    /// All definitions ordered by id, then version.
    pub fn list(&self) -> Vec<&PromptDefinition> {
        let mut all: Vec<&PromptDefinition> = self.prompts.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id).then(a.version.cmp(&b.version)));
        all
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
