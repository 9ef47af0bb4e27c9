//! Conversation entries: the value objects that flow through the loop.
//!
//! The orchestrator keeps an ordered `Vec<ConversationEntry>` per run.
//! Tool results are injected as system entries whose content starts with
//! [`OBSERVATION_PREFIX`], which distinguishes them from the original
//! system prompt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by every tool-result entry.
pub const OBSERVATION_PREFIX: &str = "Observation";

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions, injected context, and observations
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Raw tool output from an external transcript; treated as an observation
    Tool,
}

impl Role {
    /// Label used when flattening a conversation into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        }
    }
}

/// A single entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

impl ConversationEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an observation entry carrying a tool result back to the model.
    pub fn observation(text: impl AsRef<str>) -> Self {
        Self::system(format!("{OBSERVATION_PREFIX}: {}", text.as_ref()))
    }

    /// Whether this is a tool-result entry injected mid-loop.
    pub fn is_observation(&self) -> bool {
        match self.role {
            Role::Tool => true,
            Role::System => self.content.starts_with(OBSERVATION_PREFIX),
            Role::User | Role::Assistant => false,
        }
    }

    /// Whether this is a system entry that is not an observation.
    pub fn is_preserved_system(&self) -> bool {
        self.role == Role::System && !self.is_observation()
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Total character length of a slice of entries.
pub fn total_chars(entries: &[ConversationEntry]) -> usize {
    entries.iter().map(ConversationEntry::char_len).sum()
}
