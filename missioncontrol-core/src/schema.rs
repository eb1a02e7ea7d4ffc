//! Schema - Define type schemas for resources
//!
//! Providers define a schema for each resource type so configuration can be
//! rejected before any remote call is made. Schemas also carry the metadata
//! the differ needs: which attributes are computed, which are sets, and
//! which force replacement when they change.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::resource::Attributes;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    /// String restricted to a list of allowed values
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection; element order never counts as a change
    Set(Box<AttributeType>),
    /// Single nested object with its own attribute schemas
    Object(BTreeMap<String, AttributeSchema>),
}

impl AttributeType {
    /// Nested object type built from attribute schemas
    pub fn object(attributes: impl IntoIterator<Item = AttributeSchema>) -> Self {
        AttributeType::Object(
            attributes
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
        )
    }

    pub fn set_of(inner: AttributeType) -> Self {
        AttributeType::Set(Box::new(inner))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            (AttributeType::Float, Value::Number(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Object(fields), Value::Object(map)) => {
                let errors = validate_fields(fields, map, false);
                match errors.into_iter().next() {
                    None => Ok(()),
                    Some(e) => Err(e),
                }
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: json_type_name(value).to_string(),
            }),
        }
    }

    /// Canonical form used for comparisons: sets are sorted and deduplicated,
    /// nulls inside objects are dropped.
    pub fn normalize(&self, value: &Value) -> Value {
        match (self, value) {
            (AttributeType::Custom { base, .. }, v) => base.normalize(v),
            (AttributeType::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| value.clone()),
            (AttributeType::List(inner), Value::Array(items)) => {
                Value::Array(items.iter().map(|i| inner.normalize(i)).collect())
            }
            (AttributeType::Set(inner), Value::Array(items)) => {
                let mut normalized: Vec<Value> = items.iter().map(|i| inner.normalize(i)).collect();
                normalized.sort_by_key(|v| v.to_string());
                normalized.dedup();
                Value::Array(normalized)
            }
            (AttributeType::Object(fields), Value::Object(map)) => {
                let mut out = serde_json::Map::new();
                for (key, v) in map {
                    if v.is_null() {
                        continue;
                    }
                    let normalized = match fields.get(key) {
                        Some(schema) => schema.attr_type.normalize(v),
                        None => v.clone(),
                    };
                    out.insert(key.clone(), normalized);
                }
                Value::Object(out)
            }
            (_, v) => v.clone(),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Object(_) => "Object".to_string(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_f64() => "Float",
        Value::Number(_) => "Int",
        Value::String(_) => "String",
        Value::Array(_) => "List",
        Value::Object(_) => "Object",
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", .expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be configured")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("Attribute '{name}' cannot be set together with '{other}'")]
    Conflict { name: String, other: String },

    #[error("Attribute '{name}' requires '{other}' to be set")]
    MissingCompanion { name: String, other: String },

    #[error("Exactly one of {} must be set", .names.join(", "))]
    ExactlyOneOf { names: Vec<String> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Populated from API responses only
    pub computed: bool,
    /// Masked when displayed
    pub sensitive: bool,
    /// Any change forces destroy-then-create
    pub requires_replace: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Cross-attribute constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRule {
    /// When `name` is set, none of `others` may be set
    ConflictsWith { name: String, others: Vec<String> },
    /// When `name` is set, all of `others` must be set
    AlsoRequires { name: String, others: Vec<String> },
    /// Exactly one attribute of the group must be set
    ExactlyOneOf(Vec<String>),
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub rules: Vec<AttributeRule>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            rules: Vec::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn conflicts_with(mut self, name: &str, others: &[&str]) -> Self {
        self.rules.push(AttributeRule::ConflictsWith {
            name: name.to_string(),
            others: others.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn also_requires(mut self, name: &str, others: &[&str]) -> Self {
        self.rules.push(AttributeRule::AlsoRequires {
            name: name.to_string(),
            others: others.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn exactly_one_of(mut self, names: &[&str]) -> Self {
        self.rules.push(AttributeRule::ExactlyOneOf(
            names.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Known attribute that configuration may set
    pub fn is_configurable(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| !a.computed)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.sensitive)
    }

    pub fn requires_replace(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.requires_replace)
    }

    /// Validate configured attributes
    ///
    /// Null values count as unset. Computed attributes may not be configured.
    pub fn validate(&self, attributes: &Attributes) -> Result<(), Vec<TypeError>> {
        let mut errors = validate_fields(&self.attributes, attributes, true);

        let is_set = |name: &str| attributes.get(name).is_some_and(|v| !v.is_null());
        for rule in &self.rules {
            match rule {
                AttributeRule::ConflictsWith { name, others } if is_set(name) => {
                    for other in others.iter().filter(|o| is_set(o)) {
                        errors.push(TypeError::Conflict {
                            name: name.clone(),
                            other: other.clone(),
                        });
                    }
                }
                AttributeRule::AlsoRequires { name, others } if is_set(name) => {
                    for other in others.iter().filter(|o| !is_set(o)) {
                        errors.push(TypeError::MissingCompanion {
                            name: name.clone(),
                            other: other.clone(),
                        });
                    }
                }
                AttributeRule::ExactlyOneOf(names) => {
                    if names.iter().filter(|n| is_set(n)).count() != 1 {
                        errors.push(TypeError::ExactlyOneOf {
                            names: names.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Canonical form of a single attribute value for comparison
    pub fn normalize(&self, name: &str, value: &Value) -> Value {
        match self.attributes.get(name) {
            Some(schema) => schema.attr_type.normalize(value),
            None => value.clone(),
        }
    }
}

fn validate_fields(
    fields: &BTreeMap<String, AttributeSchema>,
    values: &serde_json::Map<String, Value>,
    top_level: bool,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    for (name, schema) in fields {
        let present = values.get(name).is_some_and(|v| !v.is_null());
        if schema.required && !present {
            errors.push(TypeError::MissingRequired { name: name.clone() });
        }
    }

    for (name, value) in values {
        if value.is_null() {
            continue;
        }
        let Some(schema) = fields.get(name) else {
            errors.push(TypeError::UnknownAttribute { name: name.clone() });
            continue;
        };
        if top_level && schema.computed {
            errors.push(TypeError::ComputedAttribute { name: name.clone() });
            continue;
        }
        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(if top_level {
                e
            } else {
                TypeError::AttributeError {
                    name: name.clone(),
                    inner: Box::new(e),
                }
            });
        }
    }

    errors
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// String of at least one character
    pub fn non_empty_string() -> AttributeType {
        AttributeType::Custom {
            name: "NonEmptyString".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value.as_str() {
                Some(s) if !s.is_empty() => Ok(()),
                _ => Err("string length must be at least 1".to_string()),
            },
        }
    }

    /// Absolute URL with an http or https scheme
    pub fn http_url() -> AttributeType {
        AttributeType::Custom {
            name: "HttpUrl".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value.as_str() {
                Some(s) => validate_http_url(s),
                None => Err("Expected string".to_string()),
            },
        }
    }

    /// Set of non-empty strings with at least two members
    pub fn string_set_min_two() -> AttributeType {
        AttributeType::Custom {
            name: "StringSetMinTwo".to_string(),
            base: Box::new(AttributeType::set_of(non_empty_string())),
            validate: |value| {
                let distinct: BTreeSet<&str> = value
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let len = distinct.len();
                if len >= 2 {
                    Ok(())
                } else {
                    Err(format!(
                        "set must contain at least 2 distinct elements, got {}",
                        len
                    ))
                }
            },
        }
    }
}

/// Validate that a string is an absolute http(s) URL
pub fn validate_http_url(s: &str) -> Result<(), String> {
    let parsed = url::Url::parse(s).map_err(|e| format!("Invalid URL '{}': {}", s, e))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        "http" | "https" => Err(format!("Invalid URL '{}': missing host", s)),
        other => Err(format!(
            "Invalid URL '{}': scheme must be http or https, got {}",
            s, other
        )),
    }
}
