//! Built-in JSON-Schema-style validator.
//!
//! Supports the subset of keywords a key-value store needs to guard its
//! values: `type`, `properties`, `required`, `additionalProperties: false`,
//! `items`, `enum`, `minimum`, `maximum`, `minLength` and `maxLength`.
//! Unknown keywords are ignored. All failures are collected rather than
//! stopping at the first one.

use serde_json::Value;

use crate::error::{AlphaError, Result};
use crate::storage::envelope::json_type_name;
use crate::storage::traits::{SchemaValidator, ValidationOutcome};

/// A schema document, checked for shape when constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchema {
    schema: Value,
}

impl JsonSchema {
    pub fn new(schema: Value) -> Result<Self> {
        if !schema.is_object() {
            return Err(AlphaError::InvalidInput(
                "Schema must be a JSON object".to_string(),
            ));
        }
        check_schema(&schema, "$")?;
        Ok(Self { schema })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::new(serde_json::from_str(text)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.schema
    }
}

impl SchemaValidator for JsonSchema {
    fn validate(&self, value: &Value) -> ValidationOutcome {
        let mut errors = Vec::new();
        validate_node(&self.schema, value, "$", &mut errors);
        if errors.is_empty() {
            ValidationOutcome::valid()
        } else {
            ValidationOutcome::invalid(errors)
        }
    }
}

const KNOWN_TYPES: [&str; 7] = [
    "string", "number", "integer", "boolean", "object", "array", "null",
];

fn check_schema(schema: &Value, path: &str) -> Result<()> {
    let Some(object) = schema.as_object() else {
        return Err(AlphaError::InvalidInput(format!(
            "Schema at {} must be an object",
            path
        )));
    };

    if let Some(type_value) = object.get("type") {
        let names: Vec<&Value> = match type_value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for name in names {
            let known = name.as_str().is_some_and(|n| KNOWN_TYPES.contains(&n));
            if !known {
                return Err(AlphaError::InvalidInput(format!(
                    "Schema at {} has unsupported type {}",
                    path, name
                )));
            }
        }
    }

    if let Some(required) = object.get("required") {
        let all_strings = required
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            return Err(AlphaError::InvalidInput(format!(
                "Schema at {}: required must be an array of strings",
                path
            )));
        }
    }

    if let Some(properties) = object.get("properties") {
        let properties = properties.as_object().ok_or_else(|| {
            AlphaError::InvalidInput(format!("Schema at {}: properties must be an object", path))
        })?;
        for (name, child) in properties {
            check_schema(child, &format!("{}.{}", path, name))?;
        }
    }

    if let Some(items) = object.get("items") {
        check_schema(items, &format!("{}[]", path))?;
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
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

fn validate_node(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(type_value) = schema.get("type") {
        let allowed: Vec<&str> = match type_value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            other => other.as_str().into_iter().collect(),
        };
        if !allowed.iter().any(|t| matches_type(t, value)) {
            errors.push(format!(
                "{} must be {}, got {}",
                path,
                allowed.join(" or "),
                json_type_name(value)
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(value) {
            errors.push(format!("{} must be one of the allowed values", path));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if number < min {
                errors.push(format!("{} must be >= {}", path, min));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if number > max {
                errors.push(format!("{} must be <= {}", path, max));
            }
        }
    }

    if let Some(text) = value.as_str() {
        let length = text.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if length < min {
                errors.push(format!("{} must be at least {} characters", path, min));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if length > max {
                errors.push(format!("{} must be at most {} characters", path, max));
            }
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    errors.push(format!("{} is missing required property {}", path, name));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (name, child) in properties {
                if let Some(field) = object.get(name) {
                    validate_node(child, field, &format!("{}.{}", path, name), errors);
                }
            }
        }

        if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
            for name in object.keys() {
                let declared = properties.is_some_and(|p| p.contains_key(name));
                if !declared {
                    errors.push(format!("{} has unknown property {}", path, name));
                }
            }
        }
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            validate_node(items, element, &format!("{}[{}]", path, index), errors);
        }
    }
}
