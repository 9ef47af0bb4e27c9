//! Error types for the sidekick domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all sidekick operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model service. These are never caught by the
/// orchestrator: they abort the run and reach the caller.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

impl From<ModelError> for MemoryError {
    fn from(err: ModelError) -> Self {
        MemoryError::EmbeddingFailed(err.to_string())
    }
}

/// Failures of a single tool invocation. The tool handler converts every
/// one of these into an Observation string; none escapes into the loop.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("Tool '{tool_name}' is not authorized: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid arguments for '{tool_name}': {}", .errors.join("; "))]
    InvalidArguments {
        tool_name: String,
        errors: Vec<String>,
    },

    #[error("Tool '{tool_name}' failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool '{tool_name}' timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool call '{tool_name}' rejected: {reason}")]
    Rejected { tool_name: String, reason: String },
}

impl ToolError {
    /// Short machine-readable kind, used in telemetry payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::PermissionDenied { .. } => "unauthorized",
            ToolError::InvalidArguments { .. } => "invalid_args",
            ToolError::ExecutionFailed { .. } => "execution_failed",
            ToolError::Timeout { .. } => "timeout",
            ToolError::Rejected { .. } => "rejected",
        }
    }
}
