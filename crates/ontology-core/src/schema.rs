//! Property specs: merging along a type hierarchy and checking values
//! against the merged result
//!
//! A spec maps property names to property schemas. A property schema
//! understands these keywords:
//!
//! - `type`: a type name or list of names (`string`, `number`, `integer`,
//!   `boolean`, `object`, `array`, `null`)
//! - `required: true`: the property must be present
//! - `properties` / `required: [..]`: nested object shape
//! - `items`: schema applied to every element of an array
//! - `enum`: list of allowed values
//! - `pointer_to`: the value is the id of an entity of (a subtype of) this type
//!
//! Entries whose schema is not an object are treated as unconstrained.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Deep-merge `overlay` into `base`
///
/// Objects merge key by key, recursively. Any other value in `overlay`,
/// arrays included, replaces what `base` had.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Outcome of looking up the target of a `pointer_to` property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Referent {
    /// An instance exists and its type is, or descends from, the wanted type
    Found,
    /// Nothing is stored under the id
    Missing,
    /// Something is stored under the id but with an unrelated type
    WrongType { actual: String },
}

/// Extension point resolving `pointer_to` constraints
pub trait ReferenceResolver {
    fn resolve_reference(&self, id: &str, type_id: &str) -> Referent;
}

/// How `pointer_to` constraints are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPolicy {
    /// Referents must exist and have a matching type
    #[default]
    Resolve,
    /// Missing referents pass, wrongly typed ones still fail
    IgnoreMissing,
    /// `pointer_to` is not checked at all
    IgnoreAll,
}

/// Recursive structural checker for property maps
pub struct SchemaChecker<'a> {
    resolver: &'a dyn ReferenceResolver,
    policy: PointerPolicy,
}

impl<'a> SchemaChecker<'a> {
    pub fn new(resolver: &'a dyn ReferenceResolver, policy: PointerPolicy) -> Self {
        Self { resolver, policy }
    }

    /// Check top-level `properties` against a merged spec and a list of
    /// properties the type hierarchy requires
    pub fn check(
        &self,
        properties: &Map<String, Value>,
        spec: &Map<String, Value>,
        required: &[String],
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for name in required {
            if !properties.contains_key(name) {
                errors.push(ValidationError::schema(name, "is required"));
            }
        }

        self.check_fields(properties, spec, "", &mut errors);
        errors
    }

    fn check_fields(
        &self,
        fields: &Map<String, Value>,
        spec: &Map<String, Value>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for (name, property_schema) in spec {
            let Some(schema) = property_schema.as_object() else {
                continue;
            };
            let path = join_path(path, name);

            match fields.get(name) {
                Some(value) => self.check_value(value, schema, &path, errors),
                None => {
                    if schema.get("required") == Some(&Value::Bool(true)) {
                        errors.push(ValidationError::schema(path, "is required"));
                    }
                }
            }
        }
    }

    fn check_value(
        &self,
        value: &Value,
        schema: &Map<String, Value>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        let allowed = allowed_types(schema);
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(value, t)) {
            errors.push(ValidationError::schema(
                path,
                format!("expected {}, got {}", allowed.join(" or "), type_name(value)),
            ));
            return;
        }

        if let Some(Value::Array(options)) = schema.get("enum") {
            if !options.contains(value) {
                errors.push(ValidationError::schema(
                    path,
                    format!("{} is not one of {}", value, Value::Array(options.clone())),
                ));
            }
        }

        if let Value::Object(fields) = value {
            if let Some(Value::Array(required)) = schema.get("required") {
                for name in required.iter().filter_map(Value::as_str) {
                    if !fields.contains_key(name) {
                        errors.push(ValidationError::schema(join_path(path, name), "is required"));
                    }
                }
            }
            if let Some(Value::Object(nested)) = schema.get("properties") {
                self.check_fields(fields, nested, path, errors);
            }
        }

        if let (Value::Array(items), Some(Value::Object(item_schema))) = (value, schema.get("items")) {
            for (idx, item) in items.iter().enumerate() {
                self.check_value(item, item_schema, &format!("{}[{}]", path, idx), errors);
            }
        }

        if let Some(target) = schema.get("pointer_to").and_then(Value::as_str) {
            self.check_pointer(value, target, path, errors);
        }
    }

    fn check_pointer(
        &self,
        value: &Value,
        target_type: &str,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if self.policy == PointerPolicy::IgnoreAll {
            return;
        }

        let Some(id) = value.as_str() else {
            errors.push(ValidationError::schema(path, "pointer_to should be a string"));
            return;
        };

        match self.resolver.resolve_reference(id, target_type) {
            Referent::Found => {}
            Referent::Missing if self.policy == PointerPolicy::IgnoreMissing => {}
            Referent::Missing => {
                errors.push(ValidationError::schema(path, format!("could not find {}", id)));
            }
            Referent::WrongType { actual } => errors.push(ValidationError::schema(
                path,
                format!("{} is a {}, not a {}", id, actual, target_type),
            )),
        }
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn allowed_types(schema: &Map<String, Value>) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
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
