//! # Sidekick Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! sidekick on-device agent. This crate has no I/O of its own. It defines
//! the contracts that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator (the model, the vector store, a tool) is a
//! trait here. Implementations live in their respective crates, so the
//! orchestrator can be exercised end to end with in-memory fakes.

pub mod chunk;
pub mod error;
pub mod message;
pub mod model;
pub mod schema;
pub mod tool;
pub mod vector;

// Re-export key types at crate root for ergonomics
pub use chunk::{ChunkConfig, chunk_text};
pub use error::{Error, MemoryError, ModelError, Result, ToolError};
pub use message::{ConversationEntry, OBSERVATION_PREFIX, Role, SessionId};
pub use model::{Embedder, GenerateRequest, GenerateResponse, ModelClient, ModelService};
pub use tool::{Tool, ToolArgs, ToolCall, ToolDefinition, ToolExecutor, ToolFuture};
pub use vector::{SearchHit, SparseSearchOptions, VectorMetadata, VectorRecord, VectorStore};
