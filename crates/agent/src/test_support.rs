//! Scripted collaborators shared by unit and end-to-end tests.

use async_trait::async_trait;
use sidekick_core::{GenerateRequest, GenerateResponse, ModelError, ModelService};
use sidekick_memory::{HashEmbedder, InMemoryVectorStore, MemoryManager, MemoryOptions};
use sidekick_telemetry::Telemetry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Embedding width used by [`SequentialMockModel`] and [`in_memory_manager`].
pub const TEST_EMBEDDING_DIM: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A model that returns a sequence of scripted replies.
///
/// Each call to `generate` pops the next reply. Once the script is
/// exhausted every call fails with [`ModelError::Generation`].
/// Embeddings come from a deterministic [`HashEmbedder`].
pub struct SequentialMockModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    embedder: HashEmbedder,
}

impl SequentialMockModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            embedder: HashEmbedder::new(TEST_EMBEDDING_DIM),
        }
    }

    /// A model whose every scripted reply succeeds.
    pub fn texts<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Queue another reply.
    pub fn push(&self, reply: Result<String, ModelError>) {
        lock(&self.replies).push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.requests).iter().map(|r| r.prompt.clone()).collect()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ModelService for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError> {
        let call = {
            let mut requests = lock(&self.requests);
            requests.push(request);
            requests.len()
        };
        match lock(&self.replies).pop_front() {
            Some(reply) => reply.map(GenerateResponse::text),
            None => Err(ModelError::Generation(format!(
                "no scripted reply for call #{call}"
            ))),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embedder.embed_text(text))
    }
}

/// A memory manager over an in-memory store and a hash embedder.
pub fn in_memory_manager(conversation_id: &str, telemetry: Telemetry) -> Arc<MemoryManager> {
    Arc::new(MemoryManager::new(
        conversation_id,
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashEmbedder::new(TEST_EMBEDDING_DIM)),
        telemetry,
        MemoryOptions::default(),
    ))
}
