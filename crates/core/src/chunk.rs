//! Overlapping text chunking.
//!
//! Works on `char`s, so multi-byte text is never split mid-scalar. A chunk
//! ends at the last paragraph break, sentence end, or whitespace found in
//! the second half of the window, falling back to a hard cut.

use serde::{Deserialize, Serialize};

/// Chunking parameters shared by indexing and context assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,

    /// Characters repeated between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_chars: usize, overlap: usize) -> Self {
        Self { max_chars, overlap }
    }

    /// Check that the parameters make progress.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chars == 0 {
            return Err("chunk max_chars must be > 0".into());
        }
        if self.overlap >= self.max_chars {
            return Err(format!(
                "chunk overlap ({}) must be smaller than max_chars ({})",
                self.overlap, self.max_chars
            ));
        }
        Ok(())
    }
}

/// Split text into overlapping chunks of at most `max_chars` characters.
///
/// Deterministic: the same input and config always yield the same chunks.
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let max = config.max_chars.max(1);
    if chars.len() <= max {
        return vec![trimmed.to_string()];
    }

    // Never let the overlap swallow more than half a window.
    let overlap = config.overlap.min(max / 2);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + max).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start, hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Exclusive end index for the chunk starting at `start`.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let min_end = start + (hard_end - start) / 2;

    let paragraph = (min_end.max(1)..hard_end)
        .rev()
        .find(|&i| chars[i] == '\n' && chars[i - 1] == '\n');
    if let Some(i) = paragraph {
        return i + 1;
    }

    let sentence = (min_end.max(1)..hard_end)
        .rev()
        .find(|&i| chars[i].is_whitespace() && matches!(chars[i - 1], '.' | '!' | '?'));
    if let Some(i) = sentence {
        return i + 1;
    }

    if let Some(i) = (min_end..hard_end).rev().find(|&i| chars[i].is_whitespace()) {
        return i + 1;
    }

    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = chunk_text("  hello world  ", &ChunkConfig::default());
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", &ChunkConfig::default()).is_empty());
        assert!(chunk_text(" \n\t ", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn chunks_respect_max_chars() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(100);
        let config = ChunkConfig::new(200, 40);
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Sentence one. Sentence two! Sentence three? ".repeat(50);
        let config = ChunkConfig::new(120, 20);
        assert_eq!(chunk_text(&text, &config), chunk_text(&text, &config));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "First sentence is here. Second sentence follows it. Third one ends.";
        let chunks = chunk_text(text, &ChunkConfig::new(40, 0));
        assert_eq!(chunks[0], "First sentence is here.");
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b ".repeat(30));
        let chunks = chunk_text(&text, &ChunkConfig::new(50, 0));
        assert_eq!(chunks[0], "a".repeat(30));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let words: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk_text(&text, &ChunkConfig::new(100, 30));
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "no overlap between {pair:?}");
        }
    }

    #[test]
    fn multibyte_text_is_safe() {
        let text = "日本語のテキスト。".repeat(200);
        let chunks = chunk_text(&text, &ChunkConfig::new(64, 8));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 64);
        }
    }

    #[test]
    fn text_without_whitespace_is_hard_cut() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, &ChunkConfig::new(100, 10));
        assert_eq!(chunks[0].len(), 100);
        assert!(chunks.iter().all(|c| c.len() <= 100));
    }

    #[test]
    fn validate_rejects_bad_config() {
        assert!(ChunkConfig::new(0, 0).validate().is_err());
        assert!(ChunkConfig::new(100, 100).validate().is_err());
        assert!(ChunkConfig::default().validate().is_ok());
    }
}
