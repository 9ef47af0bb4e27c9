//! In-memory vector store: the default backend for a single session.

use async_trait::async_trait;
use sidekick_core::error::MemoryError;
use sidekick_core::vector::{SearchHit, SparseSearchOptions, VectorMetadata, VectorRecord, VectorStore};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::vector::{centroid, cosine_similarity, sort_by_similarity};

/// Stores vectors in a `Vec`, oldest first.
///
/// With a capacity set, the oldest records are evicted once it is exceeded.
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
    capacity: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            capacity: None,
        }
    }

    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    /// Snapshot of all stored records, oldest first.
    pub async fn records(&self) -> Vec<VectorRecord> {
        self.records.read().await.clone()
    }

    fn score(records: &[&VectorRecord], query: &[f32], limit: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = records
            .iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                similarity: cosine_similarity(&r.embedding, query),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
                embedding: Some(r.embedding.clone()),
            })
            .collect();
        sort_by_similarity(&mut hits);
        hits.truncate(limit);
        hits
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn initialize(&self) -> Result<(), MemoryError> {
        debug!(capacity = ?self.capacity, "In-memory vector store ready");
        Ok(())
    }

    async fn add_vector(
        &self,
        content: &str,
        embedding: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<String, MemoryError> {
        if embedding.is_empty() {
            return Err(MemoryError::Storage("embedding must not be empty".into()));
        }

        let mut records = self.records.write().await;
        if let Some(first) = records.first() {
            if first.embedding.len() != embedding.len() {
                return Err(MemoryError::Storage(format!(
                    "embedding dimension mismatch: store has {}, got {}",
                    first.embedding.len(),
                    embedding.len()
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        records.push(VectorRecord {
            id: id.clone(),
            content: content.to_string(),
            embedding,
            metadata,
        });

        if let Some(cap) = self.capacity {
            if records.len() > cap {
                let excess = records.len() - cap;
                records.drain(..excess);
                debug!(evicted = excess, "Evicted oldest vectors");
            }
        }

        Ok(id)
    }

    async fn search_vectors(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let records = self.records.read().await;
        let all: Vec<&VectorRecord> = records.iter().collect();
        Ok(Self::score(&all, embedding, limit))
    }

    /// Probe the exchanges and documents whose centroid is nearest the
    /// query, then score only their chunks.
    async fn search_vectors_sparse(
        &self,
        embedding: &[f32],
        limit: usize,
        options: SparseSearchOptions,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let records = self.records.read().await;

        let mut groups: BTreeMap<&str, Vec<&VectorRecord>> = BTreeMap::new();
        for record in records.iter() {
            groups
                .entry(record.metadata.role_pair.as_str())
                .or_default()
                .push(record);
        }

        let probe = options.probe_groups.max(1);
        if groups.len() <= probe {
            let all: Vec<&VectorRecord> = records.iter().collect();
            return Ok(Self::score(&all, embedding, limit));
        }

        let mut ranked_groups: Vec<(f32, &str)> = groups
            .iter()
            .filter_map(|(key, members)| {
                let c = centroid(members.iter().map(|r| r.embedding.as_slice()))?;
                Some((cosine_similarity(&c, embedding), *key))
            })
            .collect();
        ranked_groups.sort_by(|a, b| b.0.total_cmp(&a.0));

        let candidates: Vec<&VectorRecord> = ranked_groups
            .iter()
            .take(probe)
            .flat_map(|(_, key)| groups.get(key).into_iter().flatten().copied())
            .collect();

        debug!(
            groups = groups.len(),
            probed = probe,
            candidates = candidates.len(),
            "Sparse vector search"
        );
        Ok(Self::score(&candidates, embedding, limit))
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        debug!(removed = records.len(), "Cleared vector store");
        records.clear();
        Ok(())
    }
}
