//! Versioned prompts for sidekick.
//!
//! Templates live in a [`PromptRegistry`] keyed by `id@version`. The
//! [`PromptBuilder`] validates inputs, renders text deterministically and
//! returns the [`PromptMeta`] that every telemetry event of the turn
//! carries.
//!
//! [`PromptMeta`]: sidekick_telemetry::PromptMeta

pub mod builder;
pub mod registry;
pub mod template;

pub use builder::{BuiltPrompt, PromptBuilder, TOOL_SCHEMA_VERSION, prompt_hash, render_tools};
pub use registry::{PromptDefinition, PromptRegistry, prompt_key};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt {id}@{version} not found")]
    NotFound { id: String, version: u32 },

    #[error("Invalid inputs for prompt {key}: {}", .errors.join("; "))]
    InvalidInputs { key: String, errors: Vec<String> },

    #[error("Failed to load prompts: {0}")]
    Load(String),
}

impl From<PromptError> for sidekick_core::Error {
    fn from(err: PromptError) -> Self {
        sidekick_core::Error::Config {
            message: err.to_string(),
        }
    }
}
