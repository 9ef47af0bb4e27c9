//! Memory system for sidekick.
//!
//! Long-term memory is a chunked vector index over past exchanges;
//! short-term memory is a bounded history buffer. [`MemoryManager`]
//! composes both behind one surface.

pub mod hash_embedder;
pub mod history;
pub mod in_memory;
pub mod indexer;
pub mod manager;
pub mod retriever;
pub mod vector;

pub use hash_embedder::HashEmbedder;
pub use history::HistoryService;
pub use in_memory::InMemoryVectorStore;
pub use indexer::{VectorIndexer, interaction_text};
pub use manager::{MemoryManager, MemoryOptions};
pub use retriever::{RETRIEVAL_TRACE_SCHEMA_VERSION, RetrievedContext, Retriever, RetrieverOptions};
pub use vector::{cosine_similarity, select_diverse};
