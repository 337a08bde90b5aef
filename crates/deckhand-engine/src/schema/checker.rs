//! Structural validation of document data against a registered schema.
//!
//! Interprets the JSON-schema subset the registrations use: `type`,
//! `properties`, `required`, `additionalProperties`, `items`, `pattern`,
//! and `enum`. Violations accumulate rather than short-circuiting so a
//! report can show every problem at once.

use std::fmt::Write as _;

use regex::Regex;
use serde_json::Value as Schema;
use serde_yaml::Value;

/// One schema violation, anchored at a data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path into `data` where the violation occurred.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

/// Checks `data` against `definition`, returning every violation found.
#[must_use]
pub fn check(definition: &Schema, data: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    check_value(definition, data, ".", &mut violations);
    violations
}

fn check_value(schema: &Schema, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(schema) = schema.as_object() else {
        // Anything other than an object (e.g. `true`) accepts all values.
        return;
    };

    if let Some(expected) = schema.get("type") {
        if !type_matches(expected, value) {
            out.push(SchemaViolation {
                path: path.to_string(),
                message: format!(
                    "expected type {expected}, found {}",
                    type_name_of(value)
                ),
            });
            // Remaining keywords assume the right shape.
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Schema::as_array) {
        if let Ok(as_json) = serde_json::to_value(value) {
            if !allowed.contains(&as_json) {
                out.push(SchemaViolation {
                    path: path.to_string(),
                    message: format!("value is not one of the {} allowed values", allowed.len()),
                });
            }
        }
    }

    if let Some(pattern) = schema.get("pattern").and_then(Schema::as_str) {
        if let Value::String(text) = value {
            match Regex::new(pattern) {
                Ok(regex) if regex.is_match(text) => {},
                Ok(_) => out.push(SchemaViolation {
                    path: path.to_string(),
                    message: format!("string does not match pattern {pattern:?}"),
                }),
                Err(err) => out.push(SchemaViolation {
                    path: path.to_string(),
                    message: format!("schema pattern {pattern:?} is invalid: {err}"),
                }),
            }
        }
    }

    if let Value::Mapping(mapping) = value {
        let properties = schema.get("properties").and_then(Schema::as_object);

        if let Some(required) = schema.get("required").and_then(Schema::as_array) {
            for key in required.iter().filter_map(Schema::as_str) {
                if !mapping.contains_key(key) {
                    out.push(SchemaViolation {
                        path: path.to_string(),
                        message: format!("missing required key {key:?}"),
                    });
                }
            }
        }

        for (key, entry) in mapping {
            let Some(key) = key.as_str() else {
                out.push(SchemaViolation {
                    path: path.to_string(),
                    message: "mapping key is not a string".to_string(),
                });
                continue;
            };
            let child_path = join(path, key);

            if let Some(property) = properties.and_then(|props| props.get(key)) {
                check_value(property, entry, &child_path, out);
            } else {
                match schema.get("additionalProperties") {
                    Some(Schema::Bool(false)) => out.push(SchemaViolation {
                        path: child_path,
                        message: format!("unexpected key {key:?}"),
                    }),
                    Some(extra @ Schema::Object(_)) => {
                        check_value(extra, entry, &child_path, out);
                    },
                    _ => {},
                }
            }
        }
    }

    if let (Some(items), Value::Sequence(sequence)) = (schema.get("items"), value) {
        for (index, entry) in sequence.iter().enumerate() {
            let mut child_path = path.to_string();
            let _ = write!(child_path, "[{index}]");
            check_value(items, entry, &child_path, out);
        }
    }
}

fn type_matches(expected: &Schema, value: &Value) -> bool {
    match expected {
        Schema::String(name) => single_type_matches(name, value),
        Schema::Array(names) => names
            .iter()
            .filter_map(Schema::as_str)
            .any(|name| single_type_matches(name, value)),
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "null" => value.is_null(),
        "boolean" => value.is_bool(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "array" => value.is_sequence(),
        "object" => value.is_mapping(),
        _ => true,
    }
}

fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged",
    }
}

fn join(path: &str, key: &str) -> String {
    if path == "." {
        format!(".{key}")
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn yaml(source: &str) -> Value {
        serde_yaml::from_str(source).unwrap()
    }

    #[test]
    fn accepts_conforming_objects() {
        let schema = json!({
            "type": "object",
            "properties": {
                "debug": { "type": "boolean" },
                "replicas": { "type": "integer" },
            },
            "required": ["debug"],
        });
        assert!(check(&schema, &yaml("debug: true\nreplicas: 3")).is_empty());
    }

    #[test]
    fn reports_missing_required_keys() {
        let schema = json!({ "type": "object", "required": ["debug"] });
        let violations = check(&schema, &yaml("{}"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("debug"));
        assert_eq!(violations[0].path, ".");
    }

    #[test]
    fn reports_type_mismatches_with_paths() {
        let schema = json!({
            "type": "object",
            "properties": { "replicas": { "type": "integer" } },
        });
        let violations = check(&schema, &yaml("replicas: lots"));
        assert_eq!(violations[0].path, ".replicas");
    }

    #[test]
    fn rejects_additional_properties_when_disallowed() {
        let schema = json!({
            "type": "object",
            "properties": { "a": {} },
            "additionalProperties": false,
        });
        let violations = check(&schema, &yaml("a: 1\nb: 2"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, ".b");
    }

    #[test]
    fn checks_sequence_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "layers": { "type": "array", "items": { "type": "string" } },
            },
        });
        let violations = check(&schema, &yaml("layers: [global, 7]"));
        assert_eq!(violations[0].path, ".layers[1]");
    }

    #[test]
    fn matches_string_patterns() {
        let schema = json!({ "type": "string", "pattern": "^v[0-9]+$" });
        assert!(check(&schema, &Value::String("v1".into())).is_empty());
        assert!(!check(&schema, &Value::String("one".into())).is_empty());
    }

    #[test]
    fn enum_constrains_values() {
        let schema = json!({ "enum": ["cleartext", "encrypted"] });
        assert!(check(&schema, &Value::String("cleartext".into())).is_empty());
        assert!(!check(&schema, &Value::String("plain".into())).is_empty());
    }
}
