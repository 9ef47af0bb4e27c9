//! Prompt builder: deterministic rendering plus the metadata that ties
//! each turn's telemetry back to the prompt that produced it.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use sidekick_core::ToolDefinition;
use sidekick_core::schema::validate_object;
use sidekick_telemetry::PromptMeta;
use std::sync::Arc;

use crate::PromptError;
use crate::registry::PromptRegistry;
use crate::template::render;

/// Version of [`TOOL_DESCRIPTION_FORMAT`].
pub const TOOL_SCHEMA_VERSION: u32 = 1;

/// How one tool is described to the model.
pub const TOOL_DESCRIPTION_FORMAT: &str = "- {{name}}: {{description}}\n  Parameters: {{parameters}}";

/// Text used when no tool is available.
pub const NO_TOOLS: &str = "(no tools available)";

/// A rendered prompt and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub text: String,
    pub meta: PromptMeta,
}

/// Hex SHA-256 of `text`.
pub fn prompt_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Render tool descriptions, always in name order.
pub fn render_tools(tools: &[&ToolDefinition]) -> String {
    if tools.is_empty() {
        return NO_TOOLS.to_string();
    }
    let mut sorted: Vec<&ToolDefinition> = tools.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .iter()
        .map(|tool| {
            let mut inputs = Map::new();
            inputs.insert("name".into(), json!(tool.name));
            inputs.insert("description".into(), json!(tool.description));
            inputs.insert("parameters".into(), json!(tool.parameters.to_string()));
            // Every placeholder in the format is supplied above.
            render(TOOL_DESCRIPTION_FORMAT, &inputs).unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    registry: Arc<PromptRegistry>,
}

impl PromptBuilder {
    pub fn new(registry: Arc<PromptRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    /// Validate `inputs` against the prompt's schema and render it.
    pub fn render(
        &self,
        id: &str,
        version: u32,
        inputs: &Map<String, Value>,
    ) -> Result<BuiltPrompt, PromptError> {
        let definition = self.registry.get(id, version)?;
        let key = definition.key();

        validate_object(&definition.inputs_schema, inputs).map_err(|errors| {
            PromptError::InvalidInputs {
                key: key.clone(),
                errors,
            }
        })?;
        let text = render(&definition.template, inputs).map_err(|e| PromptError::InvalidInputs {
            key,
            errors: vec![e],
        })?;

        Ok(BuiltPrompt {
            meta: PromptMeta {
                id: definition.id.clone(),
                version: definition.version,
                hash: prompt_hash(&text),
                tool_schema_version: definition.tool_schema_version,
            },
            text,
        })
    }

    /// Render a system prompt that lists `tools`.
    pub fn build_system_prompt(
        &self,
        id: &str,
        version: u32,
        tools: &[&ToolDefinition],
    ) -> Result<BuiltPrompt, PromptError> {
        let definition = self.registry.get(id, version)?;
        if let Some(expected) = definition.tool_schema_version {
            if expected != TOOL_SCHEMA_VERSION {
                return Err(PromptError::InvalidInputs {
                    key: definition.key(),
                    errors: vec![format!(
                        "prompt expects tool schema version {expected}, builder renders {TOOL_SCHEMA_VERSION}"
                    )],
                });
            }
        }

        let mut inputs = Map::new();
        inputs.insert("tools".into(), Value::String(render_tools(tools)));
        self.render(id, version, &inputs)
    }
}
