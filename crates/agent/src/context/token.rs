//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Counts
//! `char`s rather than bytes so non-ASCII text is not over-estimated.

use sidekick_core::ConversationEntry;

/// Per-entry overhead for the role label and line break.
pub const ENTRY_OVERHEAD_TOKENS: usize = 2;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Estimate tokens for a single entry including its label overhead.
pub fn estimate_entry_tokens(entry: &ConversationEntry) -> usize {
    ENTRY_OVERHEAD_TOKENS + estimate_tokens(&entry.content)
}

pub fn estimate_entries_tokens(entries: &[ConversationEntry]) -> usize {
    entries.iter().map(estimate_entry_tokens).sum()
}

/// Cut `text` to roughly `max_tokens`, on a `char` boundary.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let max_chars = max_tokens.saturating_mul(4);
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("héllo wörld!"), 3);
    }

    #[test]
    fn entry_includes_overhead() {
        let entries = vec![
            ConversationEntry::user("hello"),      // 2 + 2
            ConversationEntry::assistant("world"), // 2 + 2
        ];
        assert_eq!(estimate_entry_tokens(&entries[0]), 4);
        assert_eq!(estimate_entries_tokens(&entries), 8);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_tokens("ééééé", 1), "éééé");
        assert_eq!(truncate_to_tokens("short", 10), "short");
        assert_eq!(truncate_to_tokens("anything", 0), "");
    }
}
