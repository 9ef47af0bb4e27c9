//! `sidekick tools`: List the tool catalogue.

use sidekick_tools::{ToolRegistry, default_registry};
use std::collections::BTreeSet;

pub fn list(capabilities: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let registry = default_registry()?;
    let lines = catalogue(&registry, capabilities);
    if lines.is_empty() {
        println!("  No tools match the requested capabilities");
    }
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}

fn catalogue(registry: &ToolRegistry, capabilities: &[String]) -> Vec<String> {
    let filter: BTreeSet<String> = capabilities.iter().cloned().collect();
    let filter = (!filter.is_empty()).then_some(&filter);

    registry
        .list(filter)
        .into_iter()
        .map(|tool| {
            let category = registry.category_of(&tool.name).unwrap_or("-");
            let caps: Vec<&str> = tool.capabilities.iter().map(String::as_str).collect();
            format!(
                "{:<14} [{category}] ({}) {}",
                tool.name,
                caps.join(", "),
                tool.description
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_lists_every_tool() {
        let registry = default_registry().unwrap();
        assert_eq!(catalogue(&registry, &[]).len(), registry.len());
    }

    #[test]
    fn capability_filter_narrows_catalogue() {
        let registry = default_registry().unwrap();
        let lines = catalogue(&registry, &["math".to_string()]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("calculator"));
    }

    #[test]
    fn unknown_capability_matches_nothing() {
        let registry = default_registry().unwrap();
        assert!(catalogue(&registry, &["teleport".to_string()]).is_empty());
    }
}
