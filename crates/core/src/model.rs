//! Model service trait: the abstraction over the on-device language model.
//!
//! The core never loads or runs a model itself. It talks to a
//! [`ModelService`] through a [`ModelClient`], which guarantees that at
//! most one load is in flight: concurrent callers queue on a FIFO mutex and
//! each awaits the previous operation before proceeding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ModelError;

/// A text-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The fully rendered prompt
    pub prompt: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop: Vec::new(),
        }
    }
}

/// The model's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,

    /// Tokens generated, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_generated: Option<u32>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_generated: None,
        }
    }
}

/// The collaborator contract for the local model.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Load (or warm up) the model. Called through the load gate only.
    async fn load(&self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Generate a completion for a prompt.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError>;

    /// Embed a text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

/// Anything that can turn text into an embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loaded,
}

/// Serialises model loading and exposes generate/embed.
pub struct ModelClient {
    service: Arc<dyn ModelService>,
    load_gate: Mutex<LoadState>,
}

impl ModelClient {
    pub fn new(service: Arc<dyn ModelService>) -> Self {
        Self {
            service,
            load_gate: Mutex::new(LoadState::Unloaded),
        }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// Load the model if it is not loaded yet.
    ///
    /// `tokio::sync::Mutex` is fair, so waiters are served in arrival order.
    /// A failed load leaves the state unloaded; the next caller retries.
    pub async fn ensure_loaded(&self) -> Result<(), ModelError> {
        let mut state = self.load_gate.lock().await;
        if *state == LoadState::Loaded {
            return Ok(());
        }
        info!(model = %self.service.name(), "Loading model");
        self.service.load().await?;
        *state = LoadState::Loaded;
        Ok(())
    }

    /// Force a reload, still one at a time.
    pub async fn reload(&self) -> Result<(), ModelError> {
        let mut state = self.load_gate.lock().await;
        *state = LoadState::Unloaded;
        self.service.load().await?;
        *state = LoadState::Loaded;
        Ok(())
    }

    pub async fn is_loaded(&self) -> bool {
        *self.load_gate.lock().await == LoadState::Loaded
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError> {
        self.ensure_loaded().await?;
        debug!(prompt_chars = request.prompt.len(), "Generating");
        self.service.generate(request).await
    }
}

#[async_trait]
impl Embedder for ModelClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        self.ensure_loaded().await?;
        self.service.embed(text).await
    }
}
