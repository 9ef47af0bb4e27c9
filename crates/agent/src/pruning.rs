//! Context pruning and observation compression.
//!
//! Pruning partitions a conversation into preserved system entries
//! (system role, not an Observation) and history (everything else). All
//! preserved entries survive, together with the last `keep_last` history
//! entries and the most recent user entry. Retained history never begins
//! with an Observation, since the call that produced it was trimmed.

use serde::Serialize;
use sidekick_core::message::total_chars;
use sidekick_core::{ConversationEntry, Role};
use std::collections::BTreeSet;

/// Marker appended to truncated observation text.
pub const TRUNCATION_MARKER: &str = "…[truncated";

/// What a pruning pass removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub chars_before: usize,
    pub chars_after: usize,
    pub entries_before: usize,
    pub entries_after: usize,
    /// Leading observations dropped from the retained tail
    pub orphans_dropped: usize,
    /// Whether the latest user entry was kept outside the tail
    pub user_pinned: bool,
}

/// Prune `entries` when their total length exceeds `threshold` chars.
///
/// Returns `None` and leaves `entries` alone when under the threshold.
pub fn prune_if_needed(
    entries: &mut Vec<ConversationEntry>,
    threshold: usize,
    keep_last: usize,
) -> Option<PruneReport> {
    if total_chars(entries) <= threshold {
        return None;
    }
    Some(prune(entries, keep_last))
}

/// Prune unconditionally.
pub fn prune(entries: &mut Vec<ConversationEntry>, keep_last: usize) -> PruneReport {
    let chars_before = total_chars(entries);
    let entries_before = entries.len();

    let history: Vec<usize> = (0..entries.len())
        .filter(|&i| !entries[i].is_preserved_system())
        .collect();

    let mut tail = &history[history.len().saturating_sub(keep_last)..];
    let mut orphans_dropped = 0;
    while let Some((&first, rest)) = tail.split_first() {
        if !entries[first].is_observation() {
            break;
        }
        tail = rest;
        orphans_dropped += 1;
    }

    let mut keep: BTreeSet<usize> = (0..entries.len())
        .filter(|&i| entries[i].is_preserved_system())
        .collect();
    keep.extend(tail.iter().copied());

    let latest_user = history
        .iter()
        .rev()
        .copied()
        .find(|&i| entries[i].role == Role::User);
    let user_pinned = latest_user.is_some_and(|i| keep.insert(i));

    let mut index = 0;
    entries.retain(|_| {
        let kept = keep.contains(&index);
        index += 1;
        kept
    });

    PruneReport {
        chars_before,
        chars_after: total_chars(entries),
        entries_before,
        entries_after: entries.len(),
        orphans_dropped,
        user_pinned,
    }
}

/// Truncate `text` to `limit` chars, appending a marker that states how
/// much was cut.
pub fn compress_observation(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(limit)
        .map_or(text.len(), |(byte, _)| byte);
    format!("{}{TRUNCATION_MARKER} {} chars]", &text[..cut], total - limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: usize) -> String {
        "x".repeat(n)
    }

    fn conversation() -> Vec<ConversationEntry> {
        vec![
            ConversationEntry::system("You are helpful."),
            ConversationEntry::system("Relevant context: ..."),
            ConversationEntry::user(format!("What is the forecast? {}", big(100))),
            ConversationEntry::assistant(format!("TOOL_CALL: weather(city=\"Paris\") {}", big(3000))),
            ConversationEntry::observation(format!("sunny {}", big(3000))),
            ConversationEntry::assistant(format!("TOOL_CALL: weather(city=\"Rome\") {}", big(3000))),
            ConversationEntry::observation(format!("rainy {}", big(3000))),
            ConversationEntry::assistant(format!("TOOL_CALL: clock() {}", big(3000))),
            ConversationEntry::observation(format!("09:00 {}", big(3000))),
        ]
    }

    #[test]
    fn under_threshold_is_untouched() {
        let mut entries = vec![ConversationEntry::user("hi")];
        assert!(prune_if_needed(&mut entries, 12_000, 6).is_none());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn pruned_result_is_smaller_and_keeps_system_entries() {
        let mut entries = conversation();
        let original = entries.clone();
        let report = prune_if_needed(&mut entries, 12_000, 3).unwrap();

        assert!(report.chars_after < report.chars_before);
        assert!(entries.len() < original.len());
        for preserved in original.iter().filter(|e| e.is_preserved_system()) {
            assert!(entries.contains(preserved));
        }
    }

    #[test]
    fn retained_history_never_starts_with_observation() {
        // Tail of 3 would be [obs, assistant, obs]; the leading obs is dropped.
        let mut entries = conversation();
        let report = prune(&mut entries, 3);
        assert_eq!(report.orphans_dropped, 1);

        let first_history = entries.iter().find(|e| !e.is_preserved_system()).unwrap();
        assert!(!first_history.is_observation());
    }

    #[test]
    fn orphaned_tool_role_entry_is_dropped() {
        let mut entries = vec![
            ConversationEntry::system("You are helpful."),
            ConversationEntry::user("Forecast?"),
            ConversationEntry::assistant("TOOL_CALL: weather(city=\"Oslo\")"),
            ConversationEntry::new(Role::Tool, "cold"),
            ConversationEntry::assistant("It is cold."),
        ];
        let report = prune(&mut entries, 2);
        assert_eq!(report.orphans_dropped, 1);
        assert!(entries.iter().all(|e| e.role != Role::Tool));
        assert_eq!(entries.last().unwrap().content, "It is cold.");
    }

    #[test]
    fn latest_user_entry_is_pinned() {
        let mut entries = conversation();
        let report = prune(&mut entries, 2);
        assert!(report.user_pinned);
        assert_eq!(entries[2].role, Role::User);
        assert!(entries[2].content.starts_with("What is the forecast?"));
        assert_eq!(entries[3].role, Role::Assistant);
        assert!(entries[4].is_observation());
        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn order_is_preserved() {
        let mut entries = conversation();
        let original = entries.clone();
        prune(&mut entries, 4);
        let positions: Vec<usize> = entries
            .iter()
            .map(|e| original.iter().position(|o| o == e).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn keep_zero_leaves_system_and_user() {
        let mut entries = conversation();
        prune(&mut entries, 0);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].role, Role::User);
    }

    #[test]
    fn compression_marks_truncation() {
        assert_eq!(compress_observation("short", 10), "short");
        let out = compress_observation(&"é".repeat(2500), 2000);
        assert!(out.starts_with(&"é".repeat(2000)));
        assert!(out.ends_with("…[truncated 500 chars]"));
    }
}
