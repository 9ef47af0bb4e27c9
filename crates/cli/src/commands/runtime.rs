//! Wire the orchestrator and its collaborators from configuration.

use sidekick_agent::{ModelSummarizer, Orchestrator};
use sidekick_config::{AppConfig, SinkKind, TelemetryConfig};
use sidekick_core::{Embedder, ModelClient, SessionId};
use sidekick_memory::{HashEmbedder, InMemoryVectorStore, MemoryManager, MemoryOptions};
use sidekick_prompts::{PromptBuilder, PromptRegistry};
use sidekick_providers::OpenAiCompatModel;
use sidekick_telemetry::{JsonlSink, Telemetry, TelemetryError, TracingSink};
use sidekick_tools::{ToolHandler, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a chat session needs.
pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub telemetry: Telemetry,
    pub session_id: String,
    pub tool_count: usize,
    /// "server" when embeddings come from the model server, else "hash"
    pub embedder: &'static str,
}

/// Build the telemetry handle described by `config`.
pub fn telemetry_from_config(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    if !config.enabled {
        return Ok(Telemetry::disabled());
    }
    let telemetry = match config.sink {
        SinkKind::Jsonl => Telemetry::new(Arc::new(JsonlSink::open(config.jsonl_path())?)),
        SinkKind::Tracing => Telemetry::new(Arc::new(TracingSink)),
        SinkKind::None => return Ok(Telemetry::disabled()),
    };
    Ok(telemetry.with_redaction(config.redact))
}

pub async fn build(config: &AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let telemetry = telemetry_from_config(&config.telemetry)?;

    let model = Arc::new(ModelClient::new(Arc::new(OpenAiCompatModel::from_config(
        &config.model,
    )?)));

    // Without a dedicated embedding model, fall back to the local hash embedder.
    let (embedder, embedder_name): (Arc<dyn Embedder>, &'static str) =
        if config.model.embedding_model.is_some() {
            (model.clone(), "server")
        } else {
            (Arc::new(HashEmbedder::default()), "hash")
        };

    let mut store = InMemoryVectorStore::new();
    if let Some(limit) = config.memory.max_vectors {
        store = store.with_capacity_limit(limit);
    }

    let session_id = SessionId::new().to_string();
    let memory = Arc::new(MemoryManager::new(
        session_id.clone(),
        Arc::new(store),
        embedder,
        telemetry.clone(),
        MemoryOptions::from(&config.memory),
    ));
    memory.initialize().await?;

    let registry = Arc::new(default_registry()?);
    let tool_count = registry.len();
    let tools = ToolHandler::new(registry, telemetry.clone())
        .with_timeout(config.agent.tool_timeout_secs.map(Duration::from_secs));

    let prompts = PromptBuilder::new(Arc::new(PromptRegistry::load(
        config.prompts.registry_path.as_deref(),
    )?));
    let summarizer = ModelSummarizer::new(
        model.clone(),
        prompts.clone(),
        &config.prompts.summary_prompt_id,
        config.prompts.summary_prompt_version,
    );

    let orchestrator = Orchestrator::new(model, memory, Arc::new(tools), prompts, telemetry.clone())
        .with_agent_config(config.agent.clone())
        .with_context_config(config.context.clone())
        .with_prompts_config(config.prompts.clone())
        .with_model_config(&config.model)
        .with_summarizer(Arc::new(summarizer));

    debug!(session = %session_id, tools = tool_count, embedder = embedder_name, "Runtime ready");
    Ok(Runtime {
        orchestrator,
        telemetry,
        session_id,
        tool_count,
        embedder: embedder_name,
    })
}
