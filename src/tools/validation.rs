//! Checks model-produced tool input against a tool's schema.
//!
//! Only the schema subset the built-in tools use is understood: object
//! type, `required`, `anyOf` groups of required fields, property `type`,
//! `enum`, and numeric `minimum`/`maximum`. Each check reports the first
//! violation as a readable message.

use serde_json::{Map, Value};

/// Parse the raw argument text the model produced.
///
/// Blank input means "no arguments" and parses to an empty object.
pub fn parse_tool_input(raw: &str) -> Result<Value, String> {
    match raw.trim() {
        "" => Ok(Value::Object(Map::new())),
        text => serde_json::from_str(text).map_err(|e| format!("arguments are not valid JSON: {e}")),
    }
}

/// Insert schema `default`s for properties the input leaves out.
pub fn apply_defaults(args: &mut Value, schema: &Value) {
    let (Some(properties), Some(obj)) = (properties(schema), args.as_object_mut()) else {
        return;
    };
    for (key, default) in properties
        .iter()
        .filter_map(|(key, prop)| prop.get("default").map(|d| (key, d)))
    {
        obj.entry(key.clone()).or_insert_with(|| default.clone());
    }
}

pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", type_name(args)));
    }
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(missing) = field_names(schema.get("required"))
        .into_iter()
        .find(|name| !obj.contains_key(*name))
    {
        return Err(format!("missing required field '{missing}'"));
    }

    if let Some(groups) = schema.get("anyOf").and_then(Value::as_array) {
        let groups: Vec<Vec<&str>> = groups
            .iter()
            .map(|group| field_names(group.get("required")))
            .collect();
        let satisfied = groups
            .iter()
            .any(|group| group.iter().all(|name| obj.contains_key(*name)));
        if !satisfied {
            let described: Vec<String> = groups.iter().map(|group| group.join(" + ")).collect();
            return Err(format!("expected one of: {}", described.join(", ")));
        }
    }

    if let Some(properties) = properties(schema) {
        for (key, value) in obj {
            if let Some(prop) = properties.get(key) {
                check_property(key, value, prop)?;
            }
        }
    }
    Ok(())
}

fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

fn field_names(list: Option<&Value>) -> Vec<&str> {
    list.and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn check_property(key: &str, value: &Value, prop: &Value) -> Result<(), String> {
    if let Some(expected) = prop.get("type").and_then(Value::as_str) {
        if !has_type(value, expected) {
            return Err(format!(
                "field '{key}' expected type '{expected}', got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!(
                "field '{key}' must be one of {}, got {value}",
                options.join(", ")
            ));
        }
    }

    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    match (
        prop.get("minimum").and_then(Value::as_f64),
        prop.get("maximum").and_then(Value::as_f64),
    ) {
        (Some(min), _) if number < min => Err(format!("field '{key}' must be >= {min}, got {number}")),
        (_, Some(max)) if number > max => Err(format!("field '{key}' must be <= {max}, got {number}")),
        _ => Ok(()),
    }
}

fn has_type(value: &Value, expected: &str) -> bool {
    match expected {
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" | "boolean" | "object" | "array" | "null" => type_name(value) == expected,
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
