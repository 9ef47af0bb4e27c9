//! Tool types: the abstraction over invocable capabilities.
//!
//! A [`ToolDefinition`] is the explicit, tagged description of a tool that
//! the registry validates at registration time. Native capabilities either
//! implement the [`Tool`] trait or are wrapped from an async closure.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::error::ToolError;

/// Arguments passed to a tool, keyed by parameter name.
pub type ToolArgs = serde_json::Map<String, Value>;

/// A call extracted from model output.
///
/// `ok == false` marks a call whose argument list could not be resolved;
/// such a call is never handed to a tool's executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub name: String,

    /// Parsed arguments
    pub args: ToolArgs,

    /// Whether the arguments were resolved cleanly
    pub ok: bool,

    /// Why the call is not `ok`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
            ok: true,
            error: None,
        }
    }

    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: ToolArgs::new(),
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Executes a tool with validated arguments.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: ToolArgs) -> std::result::Result<Value, ToolError>;
}

/// A native capability exposed to the agent.
///
/// Implementations must have no side effects at construction time.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "current_time").
    fn name(&self) -> &str;

    /// A description of what this tool does (rendered into the prompt).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Capability tags used for allowlist checks.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: ToolArgs) -> std::result::Result<Value, ToolError>;
}

struct ToolAdapter<T>(Arc<T>);

#[async_trait]
impl<T: Tool + 'static> ToolExecutor for ToolAdapter<T> {
    async fn execute(&self, args: ToolArgs) -> std::result::Result<Value, ToolError> {
        self.0.execute(args).await
    }
}

/// Boxed future returned by closure-backed handlers.
pub type ToolFuture = BoxFuture<'static, std::result::Result<Value, ToolError>>;

type BoxedHandlerFn = Box<dyn Fn(ToolArgs) -> ToolFuture + Send + Sync>;

struct FnExecutor(BoxedHandlerFn);

#[async_trait]
impl ToolExecutor for FnExecutor {
    async fn execute(&self, args: ToolArgs) -> std::result::Result<Value, ToolError> {
        (self.0)(args).await
    }
}

/// An immutable description of a registrable tool.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub capabilities: BTreeSet<String>,
    handler: Option<Arc<dyn ToolExecutor>>,
}

impl ToolDefinition {
    /// Create a definition without a handler. It cannot be registered
    /// until one is attached.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            capabilities: BTreeSet::new(),
            handler: None,
        }
    }

    /// Build a definition from a [`Tool`] implementation.
    pub fn from_tool<T: Tool + 'static>(tool: T) -> Self {
        let tool = Arc::new(tool);
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
            capabilities: tool.capabilities().into_iter().collect(),
            handler: Some(Arc::new(ToolAdapter(tool))),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ToolExecutor>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Attach an async closure as the handler.
    pub fn with_handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ToolError>> + Send + 'static,
    {
        let boxed: BoxedHandlerFn = Box::new(move |args| f(args).boxed());
        self.with_handler(Arc::new(FnExecutor(boxed)))
    }

    pub fn handler(&self) -> Option<&Arc<dyn ToolExecutor>> {
        self.handler.as_ref()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Whether any capability tag of this tool is in `allowed`.
    pub fn is_allowed_by(&self, allowed: &BTreeSet<String>) -> bool {
        self.capabilities.iter().any(|c| allowed.contains(c))
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("capabilities", &self.capabilities)
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        fn capabilities(&self) -> Vec<String> {
            vec!["debug".into()]
        }
        async fn execute(&self, args: ToolArgs) -> std::result::Result<Value, ToolError> {
            Ok(args.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn definition_from_tool_carries_handler() {
        let def = ToolDefinition::from_tool(EchoTool);
        assert_eq!(def.name, "echo");
        assert!(def.has_handler());
        assert!(def.capabilities.contains("debug"));

        let mut args = ToolArgs::new();
        args.insert("text".into(), json!("hello"));
        let out = def.handler().unwrap().execute(args).await.unwrap();
        assert_eq!(out, json!("hello"));
    }

    #[tokio::test]
    async fn closure_handler_executes() {
        let def = ToolDefinition::new("add", "Adds", json!({"type": "object"}))
            .with_handler_fn(|args: ToolArgs| async move {
                let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            });
        let mut args = ToolArgs::new();
        args.insert("a".into(), json!(2));
        args.insert("b".into(), json!(3));
        let out = def.handler().unwrap().execute(args).await.unwrap();
        assert_eq!(out, json!(5));
    }

    #[test]
    fn definition_without_handler() {
        let def = ToolDefinition::new("ghost", "No handler", json!({"type": "object"}));
        assert!(!def.has_handler());
    }

    #[test]
    fn capability_intersection() {
        let def = ToolDefinition::new("t", "d", json!({})).with_capabilities(["net", "location"]);
        let allowed: BTreeSet<String> = ["location".to_string()].into_iter().collect();
        let denied: BTreeSet<String> = ["camera".to_string()].into_iter().collect();
        assert!(def.is_allowed_by(&allowed));
        assert!(!def.is_allowed_by(&denied));
    }

    #[test]
    fn malformed_call_is_not_ok() {
        let call = ToolCall::malformed("weather", "missing '=' in argument");
        assert!(!call.ok);
        assert!(call.args.is_empty());
        assert_eq!(call.error.as_deref(), Some("missing '=' in argument"));
    }
}
