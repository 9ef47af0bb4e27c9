//! Short-term conversation history: a bounded FIFO buffer.

use sidekick_core::ConversationEntry;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Keeps the most recent `capacity` entries in insertion order.
pub struct HistoryService {
    entries: RwLock<VecDeque<ConversationEntry>>,
    capacity: usize,
}

impl HistoryService {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest when full.
    pub async fn add(&self, entry: ConversationEntry) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// All entries, oldest first.
    pub async fn get_all(&self) -> Vec<ConversationEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new(20)
    }
}
