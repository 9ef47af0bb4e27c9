//! Quality re-scoring of retrieved candidates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sidekick_config::ContextConfig;
use sidekick_memory::RetrievedContext;

/// A candidate together with its re-scored quality.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredContext {
    pub item: RetrievedContext,
    pub score: f32,
}

impl ScoredContext {
    /// Use raw similarity as the score.
    pub fn unscored(item: RetrievedContext) -> Self {
        let score = item.similarity;
        Self { item, score }
    }
}

/// Multiplier in `[floor, 1]` that decays linearly with age and stays at
/// `floor` once `age_days >= window_days`.
pub fn recency_factor(age_days: f32, window_days: u32, floor: f32) -> f32 {
    let floor = floor.clamp(0.0, 1.0);
    if window_days == 0 {
        return floor;
    }
    let progress = (age_days.max(0.0) / window_days as f32).min(1.0);
    (1.0 - (1.0 - floor) * progress).max(floor)
}

/// Multiplier for a source tag; unknown sources are neutral.
pub fn source_trust(source: &str, config: &ContextConfig) -> f32 {
    config.source_trust.get(source).copied().unwrap_or(1.0)
}

/// Re-score one candidate by recency and source trust.
pub fn score(item: RetrievedContext, now: DateTime<Utc>, config: &ContextConfig) -> ScoredContext {
    let age_ms = now
        .signed_duration_since(item.metadata.timestamp)
        .num_milliseconds()
        .max(0);
    let age_days = age_ms as f32 / 86_400_000.0;

    let recency = recency_factor(age_days, config.recency_window_days, config.recency_floor);
    let trust = source_trust(&item.metadata.source, config);
    let score = item.similarity * recency * trust;
    ScoredContext { item, score }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sidekick_core::VectorMetadata;
    use sidekick_core::vector::{SOURCE_CONVERSATION, SOURCE_KNOWLEDGE_BASE};

    fn item(similarity: f32, source: &str, timestamp: DateTime<Utc>) -> RetrievedContext {
        RetrievedContext {
            id: "id".into(),
            content: "content".into(),
            similarity,
            metadata: VectorMetadata::new("session", "pair")
                .with_source(source)
                .with_timestamp(timestamp),
        }
    }

    #[test]
    fn recency_decays_to_floor() {
        assert_eq!(recency_factor(0.0, 30, 0.7), 1.0);
        assert!((recency_factor(15.0, 30, 0.7) - 0.85).abs() < 1e-6);
        assert!((recency_factor(30.0, 30, 0.7) - 0.7).abs() < 1e-6);
        assert!((recency_factor(400.0, 30, 0.7) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn recency_never_below_floor() {
        for age in [0.0, 1.0, 29.9, 30.0, 1e6] {
            assert!(recency_factor(age, 30, 0.7) >= 0.7);
        }
        assert_eq!(recency_factor(5.0, 0, 0.7), 0.7);
    }

    #[test]
    fn knowledge_base_outranks_conversation() {
        let now = Utc::now();
        let config = ContextConfig::default();
        let kb = score(item(0.6, SOURCE_KNOWLEDGE_BASE, now), now, &config);
        let chat = score(item(0.6, SOURCE_CONVERSATION, now), now, &config);
        assert!(kb.score > chat.score);
        assert!((chat.score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn old_items_score_lower() {
        let now = Utc::now();
        let config = ContextConfig::default();
        let fresh = score(item(0.8, SOURCE_CONVERSATION, now), now, &config);
        let stale = score(
            item(0.8, SOURCE_CONVERSATION, now - Duration::days(60)),
            now,
            &config,
        );
        assert!((stale.score - 0.8 * 0.7).abs() < 1e-5);
        assert!(stale.score < fresh.score);
    }

    #[test]
    fn unknown_source_is_neutral() {
        assert_eq!(source_trust("somewhere", &ContextConfig::default()), 1.0);
    }
}
