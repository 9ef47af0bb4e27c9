//! Context engineering: per-request token budgets, candidate scoring, and
//! the standard/hierarchical assembly paths.
//!
//! | Bucket | Share |
//! |--------|-------|
//! | Response reserve | a quarter of the device window |
//! | Query | its estimated size |
//! | Retrieved context | 40–70% of the rest, growing with query complexity |
//! | History | whatever remains |

pub mod budget;
pub mod engineer;
pub mod scoring;
pub mod token;

pub use budget::{TokenBudget, query_complexity};
pub use engineer::{ContextEngineer, ContextPath, EngineeredContext, TokenUsage};
pub use scoring::{ScoredContext, recency_factor, source_trust};
