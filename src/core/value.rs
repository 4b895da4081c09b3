//! Typed values and step input variants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a parameter or value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => write!(f, "string"),
            ParameterType::Integer => write!(f, "integer"),
        }
    }
}

/// A concrete scalar value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    String(String),
}

impl Value {
    /// The type this value carries
    pub fn kind(&self) -> ParameterType {
        match self {
            Value::String(_) => ParameterType::String,
            Value::Integer(_) => ParameterType::Integer,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(_) => None,
        }
    }

    /// Coerce raw text (e.g. from the command line) into the given type
    pub fn parse_as(raw: &str, kind: ParameterType) -> Option<Value> {
        match kind {
            ParameterType::String => Some(Value::String(raw.to_string())),
            ParameterType::Integer => raw.trim().parse::<i64>().ok().map(Value::Integer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

/// "Output `output_name` of step `source_step`", known only once that step succeeds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredReference {
    pub source_step: String,
    pub output_name: String,
}

impl DeferredReference {
    pub fn new(source_step: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            source_step: source_step.into(),
            output_name: output_name.into(),
        }
    }
}

impl fmt::Display for DeferredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steps.{}.{}", self.source_step, self.output_name)
    }
}

/// A step input as declared in the pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    /// Known at definition time
    Literal(Value),
    /// Produced by an upstream step
    Deferred(DeferredReference),
    /// Launch-time parameter, resolved when the run starts
    Parameter(String),
}

impl InputValue {
    pub fn deferred(source_step: impl Into<String>, output_name: impl Into<String>) -> Self {
        InputValue::Deferred(DeferredReference::new(source_step, output_name))
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        InputValue::Parameter(name.into())
    }

    /// The deferred reference, if this input is one
    pub fn as_deferred(&self) -> Option<&DeferredReference> {
        match self {
            InputValue::Deferred(reference) => Some(reference),
            _ => None,
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::Literal(value)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Literal(Value::from(s))
    }
}

impl From<i64> for InputValue {
    fn from(i: i64) -> Self {
        InputValue::Literal(Value::Integer(i))
    }
}
