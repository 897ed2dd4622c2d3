//! Schema adapter layer
//!
//! Procedures validate their inputs and outputs through the [`Schema`]
//! capability: an opaque validator that either returns the parsed value or a
//! list of [`Issue`]s. Concrete validator libraries plug in behind the trait;
//! this module also ships a small combinator validator so the crate is
//! usable without one.
//!
//! # Example
//!
//! ```rust
//! use duck_rpc::schema::{object, string, PathSegment, Schema};
//! use serde_json::json;
//!
//! let schema = object().field("name", string());
//! assert!(schema.validate(&json!({"name": "World"})).is_ok());
//!
//! let issues = schema.validate(&json!({"name": 123})).unwrap_err();
//! assert_eq!(issues[0].path, vec![PathSegment::Key("name".into())]);
//! ```

use crate::error::{RpcError, RpcResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// One step into an invalid value: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object member name
    Key(String),
    /// Array element index
    Index(u64),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<u64> for PathSegment {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

/// A single validation failure with its location inside the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Human-readable description of the failure
    pub message: String,
    /// Structured path to the invalid value (empty at the root)
    pub path: Vec<PathSegment>,
}

impl Issue {
    /// Create an issue at a specific path.
    pub fn new(message: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self {
            message: message.into(),
            path,
        }
    }

    /// Create an issue at the root of the input.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(message, Vec::new())
    }

    /// Prefix the issue path with a parent segment.
    pub fn nested(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

/// Opaque validator capability.
///
/// `validate` returns the parsed value on success. For a valid input the
/// parsed value is semantically equal to the input, and re-validating the
/// result yields an equal value.
pub trait Schema: Send + Sync {
    /// Validate an input value, returning the parsed value or the issues.
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>>;
}

impl<S: Schema + ?Sized> Schema for Arc<S> {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(input)
    }
}

/// Parse a raw input value against a schema.
///
/// Failures become `RPC_BAD_REQUEST` with the validator's issues attached.
pub fn parse_input(schema: &dyn Schema, raw: &Value) -> RpcResult<Value> {
    schema.validate(raw).map_err(|issues| {
        warn!(issue_count = issues.len(), "Input validation failed");
        RpcError::bad_request("Validation failed").with_issues(issues)
    })
}

/// Parse a resolver's output value against a schema.
///
/// Output shape is the server's responsibility, so failures become
/// `RPC_INTERNAL_SERVER_ERROR`.
pub fn parse_output(schema: &dyn Schema, raw: &Value) -> RpcResult<Value> {
    schema.validate(raw).map_err(|issues| {
        warn!(issue_count = issues.len(), "Output validation failed");
        RpcError::internal("Output validation failed").with_issues(issues)
    })
}

// =============================================================================
// Built-in combinator validators
// =============================================================================

/// Schema accepting any string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSchema;

impl Schema for StringSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        match input {
            Value::String(_) => Ok(input.clone()),
            other => Err(vec![Issue::root(format!(
                "expected a string, got {}",
                type_name(other)
            ))]),
        }
    }
}

/// Schema accepting any JSON number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberSchema;

impl Schema for NumberSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        match input {
            Value::Number(_) => Ok(input.clone()),
            other => Err(vec![Issue::root(format!(
                "expected a number, got {}",
                type_name(other)
            ))]),
        }
    }
}

/// Schema accepting integral JSON numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerSchema;

impl Schema for IntegerSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        match input {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(input.clone()),
            other => Err(vec![Issue::root(format!(
                "expected an integer, got {}",
                type_name(other)
            ))]),
        }
    }
}

/// Schema accepting booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanSchema;

impl Schema for BooleanSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        match input {
            Value::Bool(_) => Ok(input.clone()),
            other => Err(vec![Issue::root(format!(
                "expected a boolean, got {}",
                type_name(other)
            ))]),
        }
    }
}

/// Schema accepting arrays whose elements match an item schema.
pub struct ArraySchema {
    item: Arc<dyn Schema>,
}

impl Schema for ArraySchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let Value::Array(items) = input else {
            return Err(vec![Issue::root(format!(
                "expected an array, got {}",
                type_name(input)
            ))]);
        };
        let mut parsed = Vec::with_capacity(items.len());
        let mut issues = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.item.validate(item) {
                Ok(value) => parsed.push(value),
                Err(nested) => issues.extend(
                    nested
                        .into_iter()
                        .map(|issue| issue.nested(PathSegment::Index(index as u64))),
                ),
            }
        }
        if issues.is_empty() {
            Ok(Value::Array(parsed))
        } else {
            Err(issues)
        }
    }
}

/// Schema accepting `null` or a value matching the inner schema.
pub struct OptionalSchema {
    inner: Arc<dyn Schema>,
}

impl Schema for OptionalSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        match input {
            Value::Null => Ok(Value::Null),
            other => self.inner.validate(other),
        }
    }
}

/// Schema accepting objects with a declared set of fields.
///
/// Declared fields are validated (missing required fields are issues);
/// undeclared fields pass through untouched.
#[derive(Default)]
pub struct ObjectSchema {
    fields: Vec<(String, Arc<dyn Schema>, bool)>,
}

impl ObjectSchema {
    /// Declare a required field.
    pub fn field(mut self, name: impl Into<String>, schema: impl Schema + 'static) -> Self {
        self.fields.push((name.into(), Arc::new(schema), true));
        self
    }

    /// Declare an optional field (validated only when present).
    pub fn optional_field(
        mut self,
        name: impl Into<String>,
        schema: impl Schema + 'static,
    ) -> Self {
        self.fields.push((name.into(), Arc::new(schema), false));
        self
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let Value::Object(map) = input else {
            return Err(vec![Issue::root(format!(
                "expected an object, got {}",
                type_name(input)
            ))]);
        };
        let mut parsed = map.clone();
        let mut issues = Vec::new();
        for (name, schema, required) in &self.fields {
            match map.get(name) {
                Some(value) => match schema.validate(value) {
                    Ok(value) => {
                        parsed.insert(name.clone(), value);
                    }
                    Err(nested) => issues.extend(
                        nested
                            .into_iter()
                            .map(|issue| issue.nested(PathSegment::Key(name.clone()))),
                    ),
                },
                None if *required => issues.push(Issue::new(
                    format!("{} is required", name),
                    vec![PathSegment::Key(name.clone())],
                )),
                None => {}
            }
        }
        if issues.is_empty() {
            Ok(Value::Object(parsed))
        } else {
            Err(issues)
        }
    }
}

/// Adapter turning a closure (or a third-party validator call) into a schema.
pub struct FnSchema<F>(F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        (self.0)(input)
    }
}

/// Build a string schema.
pub fn string() -> StringSchema {
    StringSchema
}

/// Build a number schema.
pub fn number() -> NumberSchema {
    NumberSchema
}

/// Build an integer schema.
pub fn integer() -> IntegerSchema {
    IntegerSchema
}

/// Build a boolean schema.
pub fn boolean() -> BooleanSchema {
    BooleanSchema
}

/// Build an array schema over an item schema.
pub fn array(item: impl Schema + 'static) -> ArraySchema {
    ArraySchema {
        item: Arc::new(item),
    }
}

/// Build a schema accepting `null` or the inner schema.
pub fn optional(inner: impl Schema + 'static) -> OptionalSchema {
    OptionalSchema {
        inner: Arc::new(inner),
    }
}

/// Build an object schema; declare fields with [`ObjectSchema::field`].
pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

/// Wrap a validation closure as a schema.
pub fn custom<F>(f: F) -> FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    FnSchema(f)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Tests
// =============================================================================
