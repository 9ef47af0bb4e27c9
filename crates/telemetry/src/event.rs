//! Event model: what a telemetry record carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known event names.
pub mod names {
    pub const MODEL_INTERACTION: &str = "model_interaction";
    pub const TOOL_CALL: &str = "tool_call";
    pub const TOOL_RESULT: &str = "tool_result";
    pub const TOOL_PARSE_ERROR: &str = "tool_parse_error";
    pub const RETRIEVAL_TRACE: &str = "retrieval_trace";
    pub const CONTEXT_ENGINEERED: &str = "context_engineered";
    pub const CONTEXT_PRUNED: &str = "context_pruned";
    pub const WORKFLOW_STEP: &str = "workflow_step";
    pub const RUN_COMPLETE: &str = "run_complete";
}

/// Which prompt produced the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMeta {
    pub id: String,
    pub version: u32,

    /// Hex SHA-256 of the rendered system prompt
    pub hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_schema_version: Option<u32>,
}

/// Where in the conversation the event happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Correlation data threaded through every event of one run.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub correlation_id: Option<String>,
    pub prompt: Option<PromptMeta>,
    pub conversation: ConversationMeta,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: PromptMeta) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_conversation(
        mut self,
        session_id: impl Into<String>,
        turn_id: impl Into<String>,
    ) -> Self {
        self.conversation = ConversationMeta {
            session_id: Some(session_id.into()),
            turn_id: Some(turn_id.into()),
        };
        self
    }
}

/// A single structured telemetry record. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptMeta>,

    #[serde(default)]
    pub conversation: ConversationMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// Whether the redactor changed the payload
    #[serde(default)]
    pub redaction_applied: bool,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>, payload: Value, context: &EventContext) -> Self {
        Self {
            name: name.into(),
            payload,
            prompt: context.prompt.clone(),
            conversation: context.conversation.clone(),
            correlation_id: context.correlation_id.clone(),
            timestamp: Utc::now(),
            redaction_applied: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_carries_context() {
        let ctx = EventContext::new("corr-1")
            .with_conversation("session-1", "turn-3")
            .with_prompt(PromptMeta {
                id: "agent.system".into(),
                version: 1,
                hash: "abc".into(),
                tool_schema_version: Some(1),
            });
        let event = TelemetryEvent::new(names::TOOL_CALL, json!({"tool": "x"}), &ctx);
        assert_eq!(event.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(event.conversation.turn_id.as_deref(), Some("turn-3"));
        assert_eq!(event.prompt.as_ref().unwrap().hash, "abc");
        assert!(!event.redaction_applied);
    }

    #[test]
    fn event_serializes_flat_json() {
        let event = TelemetryEvent::new("run_complete", json!({}), &EventContext::default());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["name"], "run_complete");
        assert!(value.get("prompt").is_none());
        assert!(value.get("timestamp").is_some());
    }
}
