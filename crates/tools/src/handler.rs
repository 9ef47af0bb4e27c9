//! Tool handler: resolve, authorize, validate and execute parsed calls.
//!
//! Every outcome, including not-found, unauthorized, invalid arguments,
//! handler failure and timeout, comes back as a [`ToolOutcome`] whose
//! `observation` is fed to the model. Nothing here returns an error to
//! the loop.

use serde_json::{Value, json};
use sidekick_core::schema::validate_object;
use sidekick_core::{ToolCall, ToolError};
use sidekick_telemetry::{EventContext, Telemetry, names};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::registry::ToolRegistry;

/// The result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    /// Text handed back to the model
    pub observation: String,
    /// Raw handler output on success
    pub output: Option<Value>,
    pub error: Option<ToolError>,
    pub latency_ms: u64,
}

pub struct ToolHandler {
    registry: Arc<ToolRegistry>,
    telemetry: Telemetry,
    allowlist: Option<BTreeSet<String>>,
    timeout: Option<Duration>,
}

impl ToolHandler {
    pub fn new(registry: Arc<ToolRegistry>, telemetry: Telemetry) -> Self {
        Self {
            registry,
            telemetry,
            allowlist: None,
            timeout: None,
        }
    }

    /// Capability allowlist applied when a call supplies none of its own.
    pub fn with_allowlist(mut self, allowlist: Option<BTreeSet<String>>) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Wall-clock limit per handler invocation. Unset means no limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one call. `allowlist` overrides the handler default.
    pub async fn execute(
        &self,
        call: &ToolCall,
        allowlist: Option<&BTreeSet<String>>,
        context: &EventContext,
    ) -> ToolOutcome {
        let allowlist = allowlist.or(self.allowlist.as_ref());

        self.telemetry.event(
            names::TOOL_CALL,
            json!({
                "tool": call.name,
                "args": call.args,
                "ok": call.ok,
            }),
            context,
        );

        let started = Instant::now();
        let result = self.dispatch(call, allowlist).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(output) => ToolOutcome {
                tool: call.name.clone(),
                success: true,
                observation: observation_text(&output),
                output: Some(output),
                error: None,
                latency_ms,
            },
            Err(err) => ToolOutcome {
                tool: call.name.clone(),
                success: false,
                observation: err.to_string(),
                output: None,
                error: Some(err),
                latency_ms,
            },
        };

        let result_size = if outcome.success {
            outcome.observation.len()
        } else {
            0
        };
        self.telemetry.event(
            names::TOOL_RESULT,
            json!({
                "tool": outcome.tool,
                "success": outcome.success,
                "latencyMs": outcome.latency_ms,
                "resultSize": result_size,
                "error": outcome.error.as_ref().map(ToString::to_string),
                "errorKind": outcome.error.as_ref().map(ToolError::kind),
            }),
            context,
        );

        info!(
            tool = %outcome.tool,
            success = outcome.success,
            latency_ms = outcome.latency_ms,
            "Tool executed"
        );
        outcome
    }

    /// Execute calls strictly in order, one at a time.
    pub async fn execute_all(
        &self,
        calls: &[ToolCall],
        allowlist: Option<&BTreeSet<String>>,
        context: &EventContext,
    ) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute(call, allowlist, context).await);
        }
        outcomes
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        allowlist: Option<&BTreeSet<String>>,
    ) -> Result<Value, ToolError> {
        if !call.ok {
            return Err(ToolError::Rejected {
                tool_name: call.name.clone(),
                reason: call
                    .error
                    .clone()
                    .unwrap_or_else(|| "malformed tool call".into()),
            });
        }

        let definition = self
            .registry
            .get_tool(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        if let Some(allowed) = allowlist {
            if !definition.is_allowed_by(allowed) {
                let tags: Vec<&str> = definition.capabilities.iter().map(String::as_str).collect();
                return Err(ToolError::PermissionDenied {
                    tool_name: call.name.clone(),
                    reason: format!("capabilities [{}] are not in the allowlist", tags.join(", ")),
                });
            }
        }

        validate_object(&definition.parameters, &call.args).map_err(|errors| {
            ToolError::InvalidArguments {
                tool_name: call.name.clone(),
                errors,
            }
        })?;

        let handler = definition
            .handler()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: "no handler attached".into(),
            })?;

        debug!(tool = %call.name, "Invoking tool handler");
        let invocation = handler.execute(call.args.clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: limit.as_secs(),
                })?,
            None => invocation.await,
        }
    }
}

/// Strings are passed through; everything else is compact JSON.
fn observation_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidekick_core::{ToolArgs, ToolDefinition};
    use sidekick_telemetry::MemorySink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn weather_def(calls: Arc<AtomicUsize>) -> ToolDefinition {
        ToolDefinition::new(
            "weather",
            "Weather for a city",
            json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string"},
                    "days": {"type": "integer"}
                },
                "required": ["city"]
            }),
        )
        .with_capabilities(["network"])
        .with_handler_fn(move |args: ToolArgs| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let city = args["city"].as_str().unwrap_or_default().to_string();
                Ok(json!(format!("Sunny in {city}")))
            }
        })
    }

    fn handler_with(defs: Vec<ToolDefinition>) -> (ToolHandler, Arc<MemorySink>) {
        let mut registry = ToolRegistry::new();
        for def in defs {
            let name = def.name.clone();
            registry.register(&name, def, "test").unwrap();
        }
        let sink = Arc::new(MemorySink::new());
        let handler = ToolHandler::new(
            Arc::new(registry),
            Telemetry::new(sink.clone()).with_redaction(false),
        );
        (handler, sink)
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn executes_valid_call() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, sink) = handler_with(vec![weather_def(counter.clone())]);
        let outcome = handler
            .execute(&call("weather", json!({"city": "Paris"})), None, &EventContext::default())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.observation, "Sunny in Paris");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(sink.names(), vec!["tool_call", "tool_result"]);
        let result = &sink.named("tool_result")[0].payload;
        assert_eq!(result["success"], true);
        assert_eq!(result["resultSize"], "Sunny in Paris".len());
        assert!(result["latencyMs"].is_u64());
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_raised() {
        let (handler, sink) = handler_with(vec![]);
        let outcome = handler
            .execute(&call("teleport", json!({})), None, &EventContext::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.observation, "Tool 'teleport' not found");
        let result = &sink.named("tool_result")[0].payload;
        assert_eq!(result["success"], false);
        assert_eq!(result["errorKind"], "not_found");
    }

    #[tokio::test]
    async fn missing_required_field_skips_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, sink) = handler_with(vec![weather_def(counter.clone())]);
        let outcome = handler
            .execute(&call("weather", json!({"days": 2})), None, &EventContext::default())
            .await;
        assert!(!outcome.success);
        assert!(outcome.observation.contains("missing required field: city"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(sink.named("tool_result")[0].payload["errorKind"], "invalid_args");
    }

    #[tokio::test]
    async fn unknown_and_mistyped_fields_are_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, _) = handler_with(vec![weather_def(counter.clone())]);
        let outcome = handler
            .execute(
                &call("weather", json!({"city": "Paris", "days": "two", "extra": 1})),
                None,
                &EventContext::default(),
            )
            .await;
        assert!(outcome.observation.contains("field days has invalid type"));
        assert!(outcome.observation.contains("unknown field: extra"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn allowlist_must_intersect_capabilities() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, _) = handler_with(vec![weather_def(counter.clone())]);
        let allowed: BTreeSet<String> = ["math".to_string()].into();
        let outcome = handler
            .execute(&call("weather", json!({"city": "Oslo"})), Some(&allowed), &EventContext::default())
            .await;
        assert!(matches!(outcome.error, Some(ToolError::PermissionDenied { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let allowed: BTreeSet<String> = ["network".to_string()].into();
        let outcome = handler
            .execute(&call("weather", json!({"city": "Oslo"})), Some(&allowed), &EventContext::default())
            .await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn default_allowlist_applies_when_none_given() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, _) = handler_with(vec![weather_def(counter.clone())]);
        let handler = handler.with_allowlist(Some(["time".to_string()].into()));
        let outcome = handler
            .execute(&call("weather", json!({"city": "Oslo"})), None, &EventContext::default())
            .await;
        assert_eq!(outcome.error.map(|e| e.kind()), Some("unauthorized"));
    }

    #[tokio::test]
    async fn malformed_call_is_rejected_without_lookup() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, _) = handler_with(vec![weather_def(counter.clone())]);
        let bad = ToolCall::malformed("weather", "missing '=' in argument 'Paris'");
        let outcome = handler.execute(&bad, None, &EventContext::default()).await;
        assert!(matches!(outcome.error, Some(ToolError::Rejected { .. })));
        assert!(outcome.observation.contains("missing '='"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_failure_becomes_observation() {
        let failing = ToolDefinition::new("flaky", "Always fails", json!({"type": "object"}))
            .with_handler_fn(|_args: ToolArgs| async move {
                Err(ToolError::ExecutionFailed {
                    tool_name: "flaky".into(),
                    reason: "sensor offline".into(),
                })
            });
        let (handler, _) = handler_with(vec![failing]);
        let outcome = handler
            .execute(&call("flaky", json!({})), None, &EventContext::default())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.observation, "Tool 'flaky' failed: sensor offline");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_enforced_when_configured() {
        let slow = ToolDefinition::new("slow", "Sleeps", json!({"type": "object"}))
            .with_handler_fn(|_args: ToolArgs| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!("done"))
            });
        let (handler, _) = handler_with(vec![slow]);
        let handler = handler.with_timeout(Some(Duration::from_secs(2)));
        let outcome = handler
            .execute(&call("slow", json!({})), None, &EventContext::default())
            .await;
        assert_eq!(outcome.error.map(|e| e.kind()), Some("timeout"));
    }

    #[tokio::test]
    async fn execute_all_is_sequential_and_ordered() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (handler, sink) = handler_with(vec![weather_def(counter.clone())]);
        let calls = vec![
            call("weather", json!({"city": "A"})),
            call("missing", json!({})),
            call("weather", json!({"city": "B"})),
        ];
        let outcomes = handler.execute_all(&calls, None, &EventContext::default()).await;
        let observations: Vec<&str> = outcomes.iter().map(|o| o.observation.as_str()).collect();
        assert_eq!(observations, vec!["Sunny in A", "Tool 'missing' not found", "Sunny in B"]);
        assert_eq!(
            sink.names(),
            vec!["tool_call", "tool_result", "tool_call", "tool_result", "tool_call", "tool_result"]
        );
    }

    #[test]
    fn non_string_output_is_compact_json() {
        assert_eq!(observation_text(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(observation_text(&json!(4)), "4");
        assert_eq!(observation_text(&json!("plain")), "plain");
    }
}
