//! `{{name}}` placeholder substitution.

use serde_json::{Map, Value};

/// A placeholder occurrence: byte range in the template and its name.
struct Slot<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

fn slots(template: &str) -> Vec<Slot<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = template[cursor..].find("{{") {
        let start = cursor + rel;
        let Some(close_rel) = template[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close_rel + 2;
        let name = template[start + 2..end - 2].trim();
        if is_identifier(name) {
            found.push(Slot { start, end, name });
            cursor = end;
        } else {
            cursor = start + 2;
        }
    }
    found
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Placeholder names in first-appearance order, without duplicates.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for slot in slots(template) {
        if !names.iter().any(|n| n == slot.name) {
            names.push(slot.name.to_string());
        }
    }
    names
}

/// Substitute every placeholder. Strings are inserted verbatim, other
/// values as compact JSON. A placeholder without an input is an error.
pub fn render(template: &str, inputs: &Map<String, Value>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for slot in slots(template) {
        let value = inputs
            .get(slot.name)
            .ok_or_else(|| format!("no input for placeholder '{}'", slot.name))?;
        out.push_str(&template[last..slot.start]);
        match value {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        last = slot.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}
