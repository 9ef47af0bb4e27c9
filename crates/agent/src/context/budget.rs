//! Per-request token budgeting.
//!
//! The context window for the device tier is split into four buckets:
//! a response reserve, the query itself, retrieved context, and history.
//! More complex queries shift room from history to retrieved context.

use serde::{Deserialize, Serialize};
use sidekick_config::DeviceTier;

use super::token::estimate_tokens;

/// Words that suggest a query needs more supporting material.
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "explain",
    "compare",
    "analyze",
    "analyse",
    "why",
    "how does",
    "difference",
    "step by step",
    "summarize",
    "summarise",
    "pros and cons",
    "relationship",
    "evaluate",
    "plan",
];

/// Query length (chars) at which the length term saturates.
const LENGTH_SATURATION_CHARS: f32 = 400.0;

/// Share of the window kept free for the model's answer.
const RESPONSE_RESERVE_DIVISOR: usize = 4;

const BASE_CONTEXT_SHARE: f32 = 0.4;
const COMPLEXITY_CONTEXT_SHARE: f32 = 0.3;

/// Score a query in `[0, 1]` from its length and complexity keywords.
///
/// Half of the score comes from length, half from keyword hits
/// (0.15 per distinct keyword, capped).
pub fn query_complexity(query: &str) -> f32 {
    let length = (query.chars().count() as f32 / LENGTH_SATURATION_CHARS).min(1.0) * 0.5;

    let lowered = query.to_lowercase();
    let hits = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count();
    let keywords = (hits as f32 * 0.15).min(0.5);

    (length + keywords).clamp(0.0, 1.0)
}

/// Token allocation for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_context_tokens: usize,
    pub response_tokens: usize,
    pub query_tokens: usize,
    pub context_tokens: usize,
    pub history_tokens: usize,
    pub complexity: f32,
}

impl TokenBudget {
    /// Compute the budget for `query` on a device of `tier`.
    pub fn compute(tier: DeviceTier, query: &str) -> Self {
        Self::with_complexity(tier, query, query_complexity(query))
    }

    pub fn with_complexity(tier: DeviceTier, query: &str, complexity: f32) -> Self {
        let max_context_tokens = tier.max_context_tokens();
        let response_tokens = max_context_tokens / RESPONSE_RESERVE_DIVISOR;
        let query_tokens = estimate_tokens(query);

        let available = max_context_tokens
            .saturating_sub(response_tokens)
            .saturating_sub(query_tokens);
        let share = BASE_CONTEXT_SHARE + COMPLEXITY_CONTEXT_SHARE * complexity.clamp(0.0, 1.0);
        let context_tokens = ((available as f32) * share).floor() as usize;
        let history_tokens = available - context_tokens;

        Self {
            max_context_tokens,
            response_tokens,
            query_tokens,
            context_tokens,
            history_tokens,
            complexity,
        }
    }

    /// Tokens left for the prompt once the response is reserved.
    pub fn prompt_tokens(&self) -> usize {
        self.query_tokens + self.context_tokens + self.history_tokens
    }
}
