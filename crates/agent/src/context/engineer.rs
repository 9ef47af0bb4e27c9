//! Context engineer: budget the request, then pick and assemble context.
//!
//! Two assembly paths:
//!
//! | Path | Selected when | Context | History |
//! |------|---------------|---------|---------|
//! | Standard | short query, small history | dense retrieval, similarity filter, top-k, quality re-score | recent entries that fit |
//! | Hierarchical | long query, large history, or complex query | sparse retrieval sized to the budget | summary within the history budget |
//!
//! Retrieval failures degrade to an empty context; they never fail the run.

use serde::Serialize;
use serde_json::json;
use sidekick_config::ContextConfig;
use sidekick_core::ConversationEntry;
use sidekick_memory::{MemoryManager, RetrievedContext};
use sidekick_telemetry::{EventContext, Telemetry, names};
use std::sync::Arc;
use tracing::{debug, warn};

use super::budget::{TokenBudget, query_complexity};
use super::scoring::{ScoredContext, score};
use super::token::{estimate_entries_tokens, estimate_entry_tokens, estimate_tokens, truncate_to_tokens};
use crate::summarizer::{HistorySummarizer, render_transcript};

/// History entries concatenated when summarization is unavailable.
pub const FALLBACK_HISTORY_ENTRIES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPath {
    Standard,
    Hierarchical,
}

impl ContextPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextPath::Standard => "standard",
            ContextPath::Hierarchical => "hierarchical",
        }
    }
}

/// Tokens actually spent per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub query: usize,
    pub context: usize,
    pub history: usize,
    pub total: usize,
}

/// The assembled context for one request.
#[derive(Debug, Clone)]
pub struct EngineeredContext {
    pub path: ContextPath,
    pub budget: TokenBudget,

    /// Selected context items, best first
    pub items: Vec<ScoredContext>,

    /// Recent history kept verbatim (standard path)
    pub history: Vec<ConversationEntry>,

    /// Condensed history (hierarchical path)
    pub history_summary: Option<String>,

    /// Whether the summary is the concatenation fallback
    pub summary_fallback: bool,

    pub usage: TokenUsage,
}

impl EngineeredContext {
    /// The context block shown to the model, if any item was selected.
    pub fn context_block(&self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let mut block = String::from("Relevant context:");
        for (i, scored) in self.items.iter().enumerate() {
            block.push_str(&format!(
                "\n[{}] ({}) {}",
                i + 1,
                scored.item.metadata.source,
                scored.item.content
            ));
        }
        Some(block)
    }

    /// Entries to place between the system prompt and the user query.
    pub fn entries(&self) -> Vec<ConversationEntry> {
        let mut entries = Vec::new();
        if let Some(block) = self.context_block() {
            entries.push(ConversationEntry::system(block));
        }
        if let Some(summary) = &self.history_summary {
            entries.push(ConversationEntry::system(format!(
                "Conversation so far: {summary}"
            )));
        }
        entries.extend(self.history.iter().cloned());
        entries
    }
}

pub struct ContextEngineer {
    memory: Arc<MemoryManager>,
    summarizer: Option<Arc<dyn HistorySummarizer>>,
    config: ContextConfig,
    telemetry: Telemetry,
}

impl ContextEngineer {
    pub fn new(memory: Arc<MemoryManager>, config: ContextConfig, telemetry: Telemetry) -> Self {
        Self {
            memory,
            summarizer: None,
            config,
            telemetry,
        }
    }

    /// Summarize history on the hierarchical path. Without one, the last
    /// few entries are concatenated instead.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn HistorySummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn select_path(&self, query: &str, history_len: usize, complexity: f32) -> ContextPath {
        let long_query = query.chars().count() >= self.config.hierarchical_query_chars;
        let large_history = history_len > self.config.hierarchical_history_entries;
        let complex = complexity >= self.config.hierarchical_complexity;
        if long_query || large_history || complex {
            ContextPath::Hierarchical
        } else {
            ContextPath::Standard
        }
    }

    /// Budget the request and assemble its context.
    pub async fn engineer_context(
        &self,
        query: &str,
        history: &[ConversationEntry],
        context: &EventContext,
    ) -> EngineeredContext {
        let complexity = query_complexity(query);
        let budget = TokenBudget::with_complexity(self.config.device_tier, query, complexity);
        let path = self.select_path(query, history.len(), complexity);

        let mut engineered = match path {
            ContextPath::Standard => self.standard(query, history, budget, context).await,
            ContextPath::Hierarchical => self.hierarchical(query, history, budget, context).await,
        };
        engineered.usage = usage(&engineered);

        debug!(
            path = path.as_str(),
            complexity,
            items = engineered.items.len(),
            context_tokens = engineered.usage.context,
            history_tokens = engineered.usage.history,
            "Context engineered"
        );
        self.telemetry.event(
            names::CONTEXT_ENGINEERED,
            json!({
                "path": path,
                "complexity": complexity,
                "device_tier": self.config.device_tier.to_string(),
                "budget": engineered.budget,
                "usage": engineered.usage,
                "items": engineered.items.iter().map(|s| json!({
                    "id": s.item.id,
                    "similarity": s.item.similarity,
                    "score": s.score,
                    "source": s.item.metadata.source,
                })).collect::<Vec<_>>(),
                "history_entries": engineered.history.len(),
                "history_summarized": engineered.history_summary.is_some(),
                "summary_fallback": engineered.summary_fallback,
            }),
            context,
        );
        engineered
    }

    async fn standard(
        &self,
        query: &str,
        history: &[ConversationEntry],
        budget: TokenBudget,
        context: &EventContext,
    ) -> EngineeredContext {
        let top_k = self.config.top_k;
        let candidates = self.degrade(self.memory.retrieve(query, top_k, context).await);

        let mut relevant: Vec<RetrievedContext> = candidates
            .into_iter()
            .filter(|c| c.similarity >= self.config.similarity_threshold)
            .collect();
        relevant.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        relevant.truncate(top_k);

        let items: Vec<ScoredContext> = if self.config.memory_constrained {
            relevant.into_iter().map(ScoredContext::unscored).collect()
        } else {
            let now = chrono::Utc::now();
            let mut scored: Vec<ScoredContext> = relevant
                .into_iter()
                .map(|item| score(item, now, &self.config))
                .filter(|s| s.score >= self.config.quality_threshold)
                .collect();
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored
        };

        EngineeredContext {
            path: ContextPath::Standard,
            items: fit_items(items, budget.context_tokens),
            history: recent_history(history, budget.history_tokens),
            history_summary: None,
            summary_fallback: false,
            usage: TokenUsage::default(),
            budget,
        }
    }

    async fn hierarchical(
        &self,
        query: &str,
        history: &[ConversationEntry],
        budget: TokenBudget,
        context: &EventContext,
    ) -> EngineeredContext {
        let chunk_tokens = self.memory.chunk_config().max_chars.div_ceil(4).max(1);
        let wanted = (budget.context_tokens / chunk_tokens).max(1);
        let candidates = self.degrade(self.memory.retrieve_sparse(query, wanted, context).await);
        let items = candidates.into_iter().map(ScoredContext::unscored).collect();

        let (history_summary, summary_fallback) = if history.is_empty() {
            (None, false)
        } else {
            let (summary, fallback) = self.summarize(history, budget.history_tokens).await;
            (Some(summary), fallback)
        };

        EngineeredContext {
            path: ContextPath::Hierarchical,
            items: fit_items(items, budget.context_tokens),
            history: Vec::new(),
            history_summary,
            summary_fallback,
            usage: TokenUsage::default(),
            budget,
        }
    }

    /// Summary of `history` within `max_tokens`, and whether it is the fallback.
    async fn summarize(&self, history: &[ConversationEntry], max_tokens: usize) -> (String, bool) {
        if let Some(summarizer) = &self.summarizer {
            match summarizer.summarize(history, max_tokens).await {
                Ok(summary) if !summary.trim().is_empty() => {
                    return (truncate_to_tokens(&summary, max_tokens).to_string(), false);
                }
                Ok(_) => warn!("History summarizer returned nothing; using recent entries"),
                Err(e) => warn!(error = %e, "History summarization failed; using recent entries"),
            }
        }
        let recent = &history[history.len().saturating_sub(FALLBACK_HISTORY_ENTRIES)..];
        let text = render_transcript(recent);
        (truncate_to_tokens(&text, max_tokens).to_string(), true)
    }

    fn degrade<E: std::fmt::Display>(
        &self,
        result: Result<Vec<RetrievedContext>, E>,
    ) -> Vec<RetrievedContext> {
        result.unwrap_or_else(|e| {
            warn!(error = %e, "Retrieval failed; continuing without context");
            Vec::new()
        })
    }
}

/// Keep items in order while they fit in `max_tokens`; skip ones that don't.
fn fit_items(items: Vec<ScoredContext>, max_tokens: usize) -> Vec<ScoredContext> {
    let mut used = 0;
    items
        .into_iter()
        .filter(|s| {
            let cost = estimate_tokens(&s.item.content);
            if used + cost > max_tokens {
                return false;
            }
            used += cost;
            true
        })
        .collect()
}

/// The newest entries whose combined size fits in `max_tokens`, oldest first.
fn recent_history(history: &[ConversationEntry], max_tokens: usize) -> Vec<ConversationEntry> {
    let mut used = 0;
    let mut kept: Vec<ConversationEntry> = history
        .iter()
        .rev()
        .take_while(|entry| {
            used += estimate_entry_tokens(entry);
            used <= max_tokens
        })
        .cloned()
        .collect();
    kept.reverse();
    kept
}

fn usage(engineered: &EngineeredContext) -> TokenUsage {
    let query = engineered.budget.query_tokens;
    let context = engineered
        .items
        .iter()
        .map(|s| estimate_tokens(&s.item.content))
        .sum();
    let history = estimate_entries_tokens(&engineered.history)
        + engineered
            .history_summary
            .as_deref()
            .map_or(0, estimate_tokens);
    TokenUsage {
        query,
        context,
        history,
        total: query + context + history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::in_memory_manager;
    use async_trait::async_trait;
    use sidekick_core::vector::SOURCE_KNOWLEDGE_BASE;
    use sidekick_core::{Error, ModelError};
    use sidekick_telemetry::MemorySink;

    struct FixedSummarizer(Option<String>);

    #[async_trait]
    impl HistorySummarizer for FixedSummarizer {
        async fn summarize(
            &self,
            _history: &[ConversationEntry],
            _max_tokens: usize,
        ) -> sidekick_core::Result<String> {
            self.0
                .clone()
                .ok_or_else(|| Error::Model(ModelError::Generation("offline".into())))
        }
    }

    fn engineer(sink: &Arc<MemorySink>) -> (ContextEngineer, Arc<MemoryManager>) {
        let telemetry = Telemetry::new(sink.clone());
        let memory = in_memory_manager("session", telemetry.clone());
        (
            ContextEngineer::new(memory.clone(), ContextConfig::default(), telemetry),
            memory,
        )
    }

    fn long_history(n: usize) -> Vec<ConversationEntry> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationEntry::user(format!("question {i}"))
                } else {
                    ConversationEntry::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn path_selection() {
        let sink = Arc::new(MemorySink::new());
        let (engineer, _) = engineer(&sink);
        assert_eq!(engineer.select_path("hi", 2, 0.1), ContextPath::Standard);
        assert_eq!(
            engineer.select_path(&"q".repeat(400), 2, 0.1),
            ContextPath::Hierarchical
        );
        assert_eq!(engineer.select_path("hi", 13, 0.1), ContextPath::Hierarchical);
        assert_eq!(engineer.select_path("hi", 12, 0.1), ContextPath::Standard);
        assert_eq!(engineer.select_path("hi", 0, 0.6), ContextPath::Hierarchical);
    }

    #[tokio::test]
    async fn standard_path_selects_relevant_knowledge() {
        let sink = Arc::new(MemorySink::new());
        let (engineer, memory) = engineer(&sink);
        memory
            .add_document("Paris is the capital of France.", SOURCE_KNOWLEDGE_BASE)
            .await
            .unwrap();
        memory
            .add_document("Bananas are rich in potassium.", SOURCE_KNOWLEDGE_BASE)
            .await
            .unwrap();

        let history = vec![
            ConversationEntry::user("hello"),
            ConversationEntry::assistant("hi there"),
        ];
        let ctx = engineer
            .engineer_context("capital of France", &history, &EventContext::new("corr"))
            .await;

        assert_eq!(ctx.path, ContextPath::Standard);
        assert!(!ctx.items.is_empty());
        assert!(ctx.items.len() <= 3);
        assert_eq!(ctx.items[0].item.content, "Paris is the capital of France.");
        assert!(ctx.items.iter().all(|s| s.item.similarity >= 0.3));
        assert_eq!(ctx.history, history);
        assert!(ctx.history_summary.is_none());

        let block = ctx.context_block().unwrap();
        assert!(block.starts_with("Relevant context:\n[1] (knowledge_base) Paris"));

        let events = sink.named("context_engineered");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["path"], "standard");
        assert_eq!(events[0].payload["usage"]["total"], ctx.usage.total);
    }

    #[tokio::test]
    async fn empty_memory_yields_no_block() {
        let sink = Arc::new(MemorySink::new());
        let (engineer, _) = engineer(&sink);
        let ctx = engineer
            .engineer_context("anything", &[], &EventContext::default())
            .await;
        assert!(ctx.items.is_empty());
        assert!(ctx.context_block().is_none());
        assert!(ctx.entries().is_empty());
        assert_eq!(ctx.usage.total, ctx.budget.query_tokens);
    }

    #[tokio::test]
    async fn hierarchical_path_summarizes_history() {
        let sink = Arc::new(MemorySink::new());
        let (engineer, _) = engineer(&sink);
        let engineer =
            engineer.with_summarizer(Arc::new(FixedSummarizer(Some("They discussed trains.".into()))));

        let ctx = engineer
            .engineer_context("next stop?", &long_history(16), &EventContext::default())
            .await;
        assert_eq!(ctx.path, ContextPath::Hierarchical);
        assert_eq!(ctx.history_summary.as_deref(), Some("They discussed trains."));
        assert!(!ctx.summary_fallback);
        assert!(ctx.history.is_empty());
        assert!(ctx.usage.history <= ctx.budget.history_tokens);

        let entries = ctx.entries();
        assert_eq!(
            entries.last().unwrap().content,
            "Conversation so far: They discussed trains."
        );
    }

    #[tokio::test]
    async fn failed_summary_falls_back_to_recent_entries() {
        let sink = Arc::new(MemorySink::new());
        let (engineer, _) = engineer(&sink);
        let engineer = engineer.with_summarizer(Arc::new(FixedSummarizer(None)));

        let ctx = engineer
            .engineer_context("next stop?", &long_history(16), &EventContext::default())
            .await;
        assert!(ctx.summary_fallback);
        assert_eq!(
            ctx.history_summary.as_deref(),
            Some("User: question 12\nAssistant: answer 13\nUser: question 14\nAssistant: answer 15")
        );
        assert_eq!(sink.named("context_engineered")[0].payload["summary_fallback"], true);
    }

    #[test]
    fn items_are_fitted_to_budget() {
        let make = |content: &str| {
            ScoredContext::unscored(RetrievedContext {
                id: content.into(),
                content: content.into(),
                similarity: 0.9,
                metadata: sidekick_core::VectorMetadata::new("s", "p"),
            })
        };
        let items = vec![make(&"a".repeat(40)), make(&"b".repeat(400)), make(&"c".repeat(20))];
        let kept = fit_items(items, 20);
        let ids: Vec<char> = kept.iter().map(|s| s.item.content.chars().next().unwrap()).collect();
        assert_eq!(ids, vec!['a', 'c']);
    }

    #[test]
    fn recent_history_keeps_newest() {
        let history = long_history(6);
        // "question N" costs 5 tokens, "answer N" costs 4
        let kept = recent_history(&history, 9);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "question 4");
        assert_eq!(kept[1].content, "answer 5");
    }
}
