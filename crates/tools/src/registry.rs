//! Tool registry: the schema-checked catalogue of invocable tools.
//!
//! Registration fails closed: a definition without a handler, with a name
//! the parser could never produce, or with a malformed parameter schema is
//! refused. Listings iterate a `BTreeMap`, so they come back name-sorted
//! and prompt rendering is reproducible across runs.

use sidekick_core::schema::check_schema;
use sidekick_core::{Tool, ToolDefinition};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

use crate::parser::is_valid_tool_name;

/// Category used when a tool is registered without one.
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' has no executable handler")]
    MissingHandler(String),

    #[error("Invalid tool name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Tool '{name}' has an invalid parameter schema: {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("Tool '{0}' is already registered")]
    AlreadyRegistered(String),
}

struct Entry {
    definition: ToolDefinition,
    category: String,
}

/// A catalogue of tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under `name` in `category`.
    ///
    /// `name` must match the definition's own name. Nothing is inserted
    /// unless every check passes.
    pub fn register(
        &mut self,
        name: &str,
        definition: ToolDefinition,
        category: &str,
    ) -> Result<(), RegistryError> {
        if !is_valid_tool_name(name) {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
                reason: "must start with a letter or '_' and contain only [A-Za-z0-9_.-]".into(),
            });
        }
        if definition.name != name {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
                reason: format!("definition is named '{}'", definition.name),
            });
        }
        if !definition.has_handler() {
            return Err(RegistryError::MissingHandler(name.to_string()));
        }
        check_schema(&definition.parameters).map_err(|reason| RegistryError::InvalidSchema {
            name: name.to_string(),
            reason,
        })?;
        if self.tools.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }

        let category = if category.trim().is_empty() {
            DEFAULT_CATEGORY
        } else {
            category
        };
        debug!(tool = name, category, "Registered tool");
        self.tools.insert(
            name.to_string(),
            Entry {
                definition,
                category: category.to_string(),
            },
        );
        Ok(())
    }

    /// Register a [`Tool`] implementation under its own name.
    pub fn register_tool<T: Tool + 'static>(
        &mut self,
        tool: T,
        category: &str,
    ) -> Result<(), RegistryError> {
        let definition = ToolDefinition::from_tool(tool);
        let name = definition.name.clone();
        self.register(&name, definition, category)
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|e| &e.definition)
    }

    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|e| e.category.as_str())
    }

    /// Tool names grouped by category, both levels sorted.
    pub fn get_tool_categories(&self) -> BTreeMap<String, Vec<String>> {
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, entry) in &self.tools {
            categories
                .entry(entry.category.clone())
                .or_default()
                .push(name.clone());
        }
        categories
    }

    /// Definitions in name order, optionally restricted to tools whose
    /// capability tags intersect `capability_filter`.
    pub fn list(&self, capability_filter: Option<&BTreeSet<String>>) -> Vec<&ToolDefinition> {
        self.tools
            .values()
            .map(|e| &e.definition)
            .filter(|d| capability_filter.is_none_or(|allowed| d.is_allowed_by(allowed)))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
