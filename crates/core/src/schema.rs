//! A small JSON-Schema subset for tool parameters and prompt inputs.
//!
//! Supported keywords: `type` (single or list), `properties`, `required`,
//! `enum`, `items` (type only) and `additionalProperties` (boolean).
//! Fields not declared in `properties` are rejected unless
//! `additionalProperties` is `true`.

use serde_json::{Map, Value};

const KNOWN_TYPES: &[&str] = &[
    "string", "number", "integer", "boolean", "object", "array", "null",
];

/// Check that a schema is well-formed enough to validate against.
pub fn check_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;

    if let Some(ty) = obj.get("type") {
        if ty != "object" {
            return Err(format!("top-level schema type must be \"object\", got {ty}"));
        }
    }

    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| "\"properties\" must be an object".to_string())?;
        for (name, prop) in props {
            if let Some(ty) = prop.get("type") {
                check_type_keyword(ty).map_err(|e| format!("property '{name}': {e}"))?;
            }
        }
    }

    if let Some(required) = obj.get("required") {
        let list = required
            .as_array()
            .ok_or_else(|| "\"required\" must be an array".to_string())?;
        if list.iter().any(|v| !v.is_string()) {
            return Err("\"required\" entries must be strings".into());
        }
    }

    Ok(())
}

fn check_type_keyword(ty: &Value) -> Result<(), String> {
    let names: Vec<&Value> = match ty {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for name in names {
        match name.as_str() {
            Some(n) if KNOWN_TYPES.contains(&n) => {}
            _ => return Err(format!("unsupported type {name}")),
        }
    }
    Ok(())
}

/// Validate an argument object. Returns every violation found, in a
/// stable order (missing fields first, then per-field errors by name).
pub fn validate_object(schema: &Value, args: &Map<String, Value>) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let allow_additional = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                errors.push(format!("missing required field: {field}"));
            }
        }
    }

    let mut names: Vec<&String> = args.keys().collect();
    names.sort();
    for name in names {
        let value = &args[name];
        match properties.get(name) {
            Some(prop) => validate_value(name, prop, value, &mut errors),
            None if allow_additional => {}
            None => errors.push(format!("unknown field: {name}")),
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_value(name: &str, prop: &Value, value: &Value, errors: &mut Vec<String>) {
    if let Some(ty) = prop.get("type") {
        if !matches_type(value, ty) {
            errors.push(format!(
                "field {name} has invalid type: expected {}, got {}",
                describe_type(ty),
                json_type_name(value)
            ));
            return;
        }
    }

    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(format!("field {name} must be one of {}", Value::Array(allowed.clone())));
        }
    }

    if let (Some(items), Value::Array(values)) = (prop.get("items"), value) {
        if let Some(ty) = items.get("type") {
            for (i, item) in values.iter().enumerate() {
                if !matches_type(item, ty) {
                    errors.push(format!(
                        "field {name}[{i}] has invalid type: expected {}, got {}",
                        describe_type(ty),
                        json_type_name(item)
                    ));
                }
            }
        }
    }
}

fn matches_type(value: &Value, ty: &Value) -> bool {
    match ty {
        Value::String(name) => matches_named(value, name),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_named(value, name)),
        _ => true,
    }
}

fn matches_named(value: &Value, name: &str) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn describe_type(ty: &Value) -> String {
    match ty {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
        other => other.to_string(),
    }
}

/// The JSON type name of a value.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
