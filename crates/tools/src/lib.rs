//! Tools for sidekick: registry, tool-call parser and handler.
//!
//! The model asks for a tool by writing a `TOOL_CALL:` directive in its
//! reply. The [`parser`] turns those directives into [`ToolCall`]s, the
//! [`ToolHandler`] resolves, authorizes, validates and executes them
//! against the [`ToolRegistry`], and each outcome becomes an Observation
//! for the next model turn.
//!
//! [`ToolCall`]: sidekick_core::ToolCall

pub mod builtin;
pub mod handler;
pub mod parser;
pub mod registry;

pub use handler::{ToolHandler, ToolOutcome};
pub use parser::{
    ParseReport, ParseWarning, ParseWarningKind, TOOL_CALL_MARKER, contains_tool_call,
    parse_tool_calls, render_tool_call,
};
pub use registry::{RegistryError, ToolRegistry};

/// Create a registry holding the portable built-in tools.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register_tool(builtin::CurrentTimeTool::new(), "utility")?;
    registry.register_tool(builtin::CalculatorTool, "utility")?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.names(), vec!["calculator", "current_time"]);
        assert!(registry.get_tool("calculator").unwrap().capabilities.contains("math"));
        assert!(registry.get_tool("current_time").unwrap().capabilities.contains("time"));
    }
}
