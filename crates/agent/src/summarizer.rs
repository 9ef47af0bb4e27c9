//! History summarization strategies for the hierarchical context path.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sidekick_core::{ConversationEntry, GenerateRequest, ModelClient};
use sidekick_prompts::PromptBuilder;
use std::sync::Arc;
use tracing::debug;

/// Condenses conversation history into at most `max_tokens` tokens.
#[async_trait]
pub trait HistorySummarizer: Send + Sync {
    async fn summarize(
        &self,
        history: &[ConversationEntry],
        max_tokens: usize,
    ) -> sidekick_core::Result<String>;
}

/// Flatten entries into `Role: content` lines.
pub fn render_transcript(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role.label(), e.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarizes with the model, using a registered summary prompt.
pub struct ModelSummarizer {
    model: Arc<ModelClient>,
    prompts: PromptBuilder,
    prompt_id: String,
    prompt_version: u32,
    temperature: f32,
}

impl ModelSummarizer {
    pub fn new(
        model: Arc<ModelClient>,
        prompts: PromptBuilder,
        prompt_id: impl Into<String>,
        prompt_version: u32,
    ) -> Self {
        Self {
            model,
            prompts,
            prompt_id: prompt_id.into(),
            prompt_version,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl HistorySummarizer for ModelSummarizer {
    async fn summarize(
        &self,
        history: &[ConversationEntry],
        max_tokens: usize,
    ) -> sidekick_core::Result<String> {
        // ~0.75 words per token
        let max_words = (max_tokens * 3 / 4).max(1);

        let mut inputs = Map::new();
        inputs.insert("history".into(), Value::String(render_transcript(history)));
        inputs.insert("max_words".into(), Value::from(max_words));
        let prompt = self
            .prompts
            .render(&self.prompt_id, self.prompt_version, &inputs)?;

        let mut request = GenerateRequest::new(prompt.text);
        request.max_tokens = u32::try_from(max_tokens).unwrap_or(u32::MAX).max(1);
        request.temperature = self.temperature;

        let response = self.model.generate(request).await?;
        let summary = response.text.trim().to_string();
        debug!(
            entries = history.len(),
            summary_chars = summary.len(),
            "Summarized history"
        );
        Ok(summary)
    }
}
