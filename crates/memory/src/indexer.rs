//! Vector indexer: chunk, embed, store.

use sidekick_core::vector::{SOURCE_CONVERSATION, VectorMetadata, VectorStore};
use sidekick_core::{ChunkConfig, Embedder, MemoryError, chunk_text};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Writes one vector record per chunk of a completed exchange.
pub struct VectorIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkConfig,
}

impl VectorIndexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, chunking: ChunkConfig) -> Self {
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn chunking(&self) -> ChunkConfig {
        self.chunking
    }

    /// Index one user/assistant exchange with its tool results.
    ///
    /// Returns the ids of the written records, in chunk order.
    pub async fn index(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
        tool_results: &[String],
    ) -> Result<Vec<String>, MemoryError> {
        let blob = interaction_text(user_text, assistant_text, tool_results);
        let role_pair = format!("turn-{}", Uuid::new_v4());
        let meta = VectorMetadata::new(conversation_id, role_pair).with_source(SOURCE_CONVERSATION);
        self.write_chunks(&blob, meta).await
    }

    /// Index free-standing text (e.g. a knowledge-base document).
    pub async fn index_document(
        &self,
        conversation_id: &str,
        content: &str,
        source: &str,
    ) -> Result<Vec<String>, MemoryError> {
        let meta = VectorMetadata::new(conversation_id, format!("doc-{}", Uuid::new_v4()))
            .with_source(source);
        self.write_chunks(content, meta).await
    }

    async fn write_chunks(&self, text: &str, meta: VectorMetadata) -> Result<Vec<String>, MemoryError> {
        let chunks = chunk_text(text, &self.chunking);
        let total = chunks.len();
        let mut ids = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            let embedding = self.embedder.embed(chunk).await?;
            let id = self
                .store
                .add_vector(chunk, embedding, meta.clone().with_chunk(index, total))
                .await?;
            ids.push(id);
        }

        debug!(
            conversation = %meta.conversation_id,
            role_pair = %meta.role_pair,
            chunks = total,
            "Indexed into vector memory"
        );
        Ok(ids)
    }
}

/// The text blob indexed for one exchange.
pub fn interaction_text(user_text: &str, assistant_text: &str, tool_results: &[String]) -> String {
    let mut blob = format!("User: {user_text}\nAssistant: {assistant_text}");
    if !tool_results.is_empty() {
        blob.push_str("\nTool results:");
        for result in tool_results {
            blob.push_str("\n- ");
            blob.push_str(result);
        }
    }
    blob
}
