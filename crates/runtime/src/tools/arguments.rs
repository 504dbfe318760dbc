//! Decoding of model-produced tool arguments.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a raw argument payload could not be used.
#[derive(Debug, Error)]
pub enum ArgumentsError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Arguments for a single tool call, always a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(pub Map<String, Value>);

impl ToolArguments {
    /// Parse the raw payload of a tool call.
    ///
    /// An empty payload means no arguments.
    pub fn parse(raw: &str) -> Result<Self, ArgumentsError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::try_from(serde_json::from_str::<Value>(raw)?)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl TryFrom<Value> for ToolArguments {
    type Error = ArgumentsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ArgumentsError::NotAnObject("null")),
            Value::Bool(_) => Err(ArgumentsError::NotAnObject("a boolean")),
            Value::Number(_) => Err(ArgumentsError::NotAnObject("a number")),
            Value::String(_) => Err(ArgumentsError::NotAnObject("a string")),
            Value::Array(_) => Err(ArgumentsError::NotAnObject("an array")),
        }
    }
}
