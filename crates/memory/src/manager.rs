//! Memory manager: the single memory surface the orchestrator uses.

use sidekick_config::MemoryConfig;
use sidekick_core::vector::VectorStore;
use sidekick_core::{ChunkConfig, ConversationEntry, Embedder, MemoryError};
use sidekick_telemetry::{EventContext, Telemetry};
use std::sync::Arc;

use crate::history::HistoryService;
use crate::indexer::VectorIndexer;
use crate::retriever::{RetrievedContext, Retriever, RetrieverOptions};

/// Settings for a [`MemoryManager`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryOptions {
    pub history_capacity: usize,
    pub chunking: ChunkConfig,
    pub retriever: RetrieverOptions,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            chunking: ChunkConfig::default(),
            retriever: RetrieverOptions::default(),
        }
    }
}

impl From<&MemoryConfig> for MemoryOptions {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            history_capacity: config.history_capacity,
            chunking: config.chunking,
            retriever: RetrieverOptions {
                overfetch_factor: config.overfetch_factor,
                cluster_threshold: config.cluster_threshold,
                probe_groups: config.sparse_probe_groups,
            },
        }
    }
}

/// Composes indexer, retriever and history for one conversation session.
pub struct MemoryManager {
    conversation_id: String,
    store: Arc<dyn VectorStore>,
    indexer: VectorIndexer,
    retriever: Retriever,
    history: HistoryService,
    chunking: ChunkConfig,
}

impl MemoryManager {
    pub fn new(
        conversation_id: impl Into<String>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        telemetry: Telemetry,
        options: MemoryOptions,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            indexer: VectorIndexer::new(store.clone(), embedder.clone(), options.chunking),
            retriever: Retriever::new(store.clone(), embedder, telemetry, options.retriever),
            history: HistoryService::new(options.history_capacity),
            chunking: options.chunking,
            store,
        }
    }

    /// Prepare the underlying store.
    pub async fn initialize(&self) -> Result<(), MemoryError> {
        self.store.initialize().await
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The chunking shared by indexing and context assembly.
    pub fn chunk_config(&self) -> ChunkConfig {
        self.chunking
    }

    pub async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        context: &EventContext,
    ) -> Result<Vec<RetrievedContext>, MemoryError> {
        self.retriever.retrieve(query, max_results, context).await
    }

    pub async fn retrieve_sparse(
        &self,
        query: &str,
        max_results: usize,
        context: &EventContext,
    ) -> Result<Vec<RetrievedContext>, MemoryError> {
        self.retriever.retrieve_sparse(query, max_results, context).await
    }

    /// Persist a completed exchange: vector memory first, then history.
    ///
    /// If indexing fails, history is left untouched.
    pub async fn add_interaction(
        &self,
        user_text: &str,
        assistant_text: &str,
        tool_results: &[String],
    ) -> Result<(), MemoryError> {
        self.indexer
            .index(&self.conversation_id, user_text, assistant_text, tool_results)
            .await?;
        self.history.add(ConversationEntry::user(user_text)).await;
        self.history.add(ConversationEntry::assistant(assistant_text)).await;
        Ok(())
    }

    /// Index reference material with a provenance tag.
    pub async fn add_document(&self, content: &str, source: &str) -> Result<usize, MemoryError> {
        let ids = self
            .indexer
            .index_document(&self.conversation_id, content, source)
            .await?;
        Ok(ids.len())
    }

    /// Short-term history, oldest first.
    pub async fn history(&self) -> Vec<ConversationEntry> {
        self.history.get_all().await
    }

    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }

    /// Forget the session: drop every stored vector, then the history.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.store.clear().await?;
        self.history.clear().await;
        Ok(())
    }
}
