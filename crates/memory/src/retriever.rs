//! Retriever: embed the query, over-fetch, re-rank, trace.
//!
//! The `retrieval_trace` event is the dataset used to evaluate retrieval
//! offline. Its payload layout is versioned by `schema_version`; add
//! fields, never rename or remove them.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sidekick_core::vector::{SearchHit, SparseSearchOptions, VectorMetadata, VectorStore};
use sidekick_core::{Embedder, MemoryError};
use sidekick_telemetry::{EventContext, Telemetry, names};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::vector::{cosine_similarity, select_diverse, sort_by_similarity};

pub const RETRIEVAL_TRACE_SCHEMA_VERSION: u32 = 1;

/// Retrieval tuning.
#[derive(Debug, Clone, Copy)]
pub struct RetrieverOptions {
    /// Candidates requested per wanted result
    pub overfetch_factor: usize,
    /// Cosine similarity at which candidates are treated as duplicates
    pub cluster_threshold: f32,
    /// Groups probed by sparse retrieval
    pub probe_groups: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            cluster_threshold: 0.92,
            probe_groups: 4,
        }
    }
}

/// A retrieved context item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub id: String,
    pub content: String,

    /// Cosine similarity to the query
    pub similarity: f32,

    pub metadata: VectorMetadata,
}

impl From<SearchHit> for RetrievedContext {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            similarity: hit.similarity,
            metadata: hit.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dense,
    Sparse,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Dense => "dense",
            Mode::Sparse => "sparse",
        }
    }
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    telemetry: Telemetry,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        telemetry: Telemetry,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            telemetry,
            options,
        }
    }

    /// Exact retrieval with clustering re-rank.
    pub async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        context: &EventContext,
    ) -> Result<Vec<RetrievedContext>, MemoryError> {
        self.run(query, max_results, Mode::Dense, context).await
    }

    /// Approximate retrieval over the nearest exchange and document groups.
    pub async fn retrieve_sparse(
        &self,
        query: &str,
        max_results: usize,
        context: &EventContext,
    ) -> Result<Vec<RetrievedContext>, MemoryError> {
        self.run(query, max_results, Mode::Sparse, context).await
    }

    async fn run(
        &self,
        query: &str,
        max_results: usize,
        mode: Mode,
        context: &EventContext,
    ) -> Result<Vec<RetrievedContext>, MemoryError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let query_embedding = self.embedder.embed(query).await?;
        let candidates_requested = max_results.saturating_mul(self.options.overfetch_factor.max(1));

        let mut candidates = match mode {
            Mode::Dense => {
                self.store
                    .search_vectors(&query_embedding, candidates_requested)
                    .await?
            }
            Mode::Sparse => {
                let opts = SparseSearchOptions {
                    probe_groups: self.options.probe_groups,
                };
                self.store
                    .search_vectors_sparse(&query_embedding, candidates_requested, opts)
                    .await?
            }
        };

        // Re-score against the query embedding; stores may report their
        // own (approximate) similarity.
        for hit in &mut candidates {
            if let Some(embedding) = &hit.embedding {
                hit.similarity = cosine_similarity(embedding, &query_embedding);
            }
        }
        sort_by_similarity(&mut candidates);

        let candidate_scores: Vec<serde_json::Value> = candidates
            .iter()
            .map(|h| json!({ "id": h.id, "score": h.similarity }))
            .collect();
        let candidates_returned = candidates.len();

        let selected = select_diverse(candidates, self.options.cluster_threshold, max_results);
        let latency_ms = started.elapsed().as_millis() as u64;

        self.telemetry.event(
            names::RETRIEVAL_TRACE,
            json!({
                "schema_version": RETRIEVAL_TRACE_SCHEMA_VERSION,
                "mode": mode.as_str(),
                "query": query,
                "requested": max_results,
                "candidates_requested": candidates_requested,
                "candidates_returned": candidates_returned,
                "returned": selected.len(),
                "latency_ms": latency_ms,
                "candidates": candidate_scores,
                "hits": selected.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
            }),
            context,
        );

        debug!(
            mode = mode.as_str(),
            requested = max_results,
            candidates = candidates_returned,
            returned = selected.len(),
            latency_ms,
            "Retrieved context"
        );

        Ok(selected.into_iter().map(RetrievedContext::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_embedder::HashEmbedder;
    use crate::in_memory::InMemoryVectorStore;
    use sidekick_telemetry::MemorySink;

    async fn seeded() -> (Retriever, Arc<MemorySink>) {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(128));
        for text in [
            "The Eiffel Tower is in Paris",
            "Paris is the capital of France",
            "Rust has a borrow checker",
            "Cargo builds Rust crates",
            "Bananas are yellow fruit",
        ] {
            store
                .add_vector(text, embedder.embed_text(text), VectorMetadata::new("s", "t"))
                .await
                .unwrap();
        }
        let sink = Arc::new(MemorySink::new());
        let retriever = Retriever::new(
            store,
            embedder,
            Telemetry::new(sink.clone()).with_redaction(false),
            RetrieverOptions::default(),
        );
        (retriever, sink)
    }

    #[tokio::test]
    async fn returns_most_similar_first() {
        let (retriever, _) = seeded().await;
        let hits = retriever
            .retrieve("Rust borrow checker", 2, &EventContext::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Rust has a borrow checker");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn emits_stable_trace() {
        let (retriever, sink) = seeded().await;
        let ctx = EventContext::new("corr-7");
        retriever.retrieve("Paris", 1, &ctx).await.unwrap();

        let traces = sink.named("retrieval_trace");
        assert_eq!(traces.len(), 1);
        let p = &traces[0].payload;
        assert_eq!(p["schema_version"], 1);
        assert_eq!(p["query"], "Paris");
        assert_eq!(p["requested"], 1);
        assert_eq!(p["candidates_requested"], 3);
        assert_eq!(p["candidates_returned"], 3);
        assert_eq!(p["returned"], 1);
        assert!(p["latency_ms"].is_u64());
        assert_eq!(p["candidates"].as_array().unwrap().len(), 3);
        assert!(p["candidates"][0]["id"].is_string());
        assert!(p["candidates"][0]["score"].is_number());
        assert_eq!(p["hits"].as_array().unwrap().len(), 1);
        assert_eq!(traces[0].correlation_id.as_deref(), Some("corr-7"));
    }

    #[tokio::test]
    async fn zero_results_requested_is_a_no_op() {
        let (retriever, sink) = seeded().await;
        let hits = retriever.retrieve("anything", 0, &EventContext::default()).await.unwrap();
        assert!(hits.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn sparse_mode_is_traced() {
        let (retriever, sink) = seeded().await;
        let hits = retriever
            .retrieve_sparse("Cargo crates", 1, &EventContext::default())
            .await
            .unwrap();
        assert_eq!(hits[0].content, "Cargo builds Rust crates");
        assert_eq!(sink.named("retrieval_trace")[0].payload["mode"], "sparse");
    }
}
