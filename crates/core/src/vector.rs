//! Vector store trait: the abstraction over embedding persistence.
//!
//! Records are immutable once written. Every record carries metadata that
//! ties it back to the conversation turn and chunk it came from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Default provenance of indexed content.
pub const SOURCE_CONVERSATION: &str = "conversation";
pub const SOURCE_KNOWLEDGE_BASE: &str = "knowledge_base";
pub const SOURCE_TOOL: &str = "tool";

/// Metadata attached to every stored vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    /// Session the turn belongs to
    pub conversation_id: String,

    /// Identifier of the (user, assistant) exchange
    pub role_pair: String,

    /// Position of this chunk within the turn
    pub chunk_index: usize,

    /// Total chunks produced for the turn
    pub chunk_total: usize,

    pub timestamp: DateTime<Utc>,

    /// Provenance tag ("conversation", "knowledge_base", "tool")
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    SOURCE_CONVERSATION.to_string()
}

impl VectorMetadata {
    pub fn new(conversation_id: impl Into<String>, role_pair: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role_pair: role_pair.into(),
            chunk_index: 0,
            chunk_total: 1,
            timestamp: Utc::now(),
            source: default_source(),
        }
    }

    pub fn with_chunk(mut self, index: usize, total: usize) -> Self {
        self.chunk_index = index;
        self.chunk_total = total;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// A search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,

    /// Cosine similarity in [-1, 1]
    pub similarity: f32,

    pub content: String,
    pub metadata: VectorMetadata,

    /// Present when the store can return stored vectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Tuning for approximate search over grouped records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SparseSearchOptions {
    /// How many groups (one per exchange or document) to probe
    pub probe_groups: usize,
}

impl Default for SparseSearchOptions {
    fn default() -> Self {
        Self { probe_groups: 4 }
    }
}

/// The collaborator contract for vector persistence.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Prepare the store for use.
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    /// Store a vector, returning its id.
    async fn add_vector(
        &self,
        content: &str,
        embedding: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<String, MemoryError>;

    /// Exact nearest-neighbour search, most similar first.
    async fn search_vectors(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError>;

    /// Approximate search. Stores without an index fall back to exact search.
    async fn search_vectors_sparse(
        &self,
        embedding: &[f32],
        limit: usize,
        _options: SparseSearchOptions,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        self.search_vectors(embedding, limit).await
    }

    /// Number of stored records.
    async fn count(&self) -> Result<usize, MemoryError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), MemoryError>;
}
