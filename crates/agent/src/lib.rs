//! The sidekick agent: a bounded reason-act loop over a local model.
//!
//! Each turn follows a **Prompt → Retrieve → Act → Observe** cycle:
//!
//! 1. **Build** the versioned system prompt with the allowed tools
//! 2. **Retrieve** context from memory, budgeted for the device
//! 3. **Call** the model
//! 4. **If tool calls**: execute them in order, append Observations, loop to step 3
//! 5. **If plain text**: persist the exchange and return it
//!
//! The loop ends when the model answers without a tool call or the
//! iteration ceiling is reached.

pub mod context;
pub mod orchestrator;
pub mod pruning;
pub mod summarizer;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use context::{
    ContextEngineer, ContextPath, EngineeredContext, ScoredContext, TokenBudget, TokenUsage,
};
pub use orchestrator::{Orchestrator, RunOptions, RunReport, Terminal, render_conversation};
pub use pruning::{PruneReport, compress_observation, prune, prune_if_needed};
pub use summarizer::{HistorySummarizer, ModelSummarizer};
