//! Raw printer status document.
//!
//! The printer answers an object query with
//! `{"result": {"status": {"<object>": {"<field>": ...}}}}`. `RawStatus`
//! holds the inner `status` mapping for the duration of one cycle.

use crate::error::StatusError;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatus {
    objects: Map<String, Value>,
}

impl RawStatus {
    pub fn new(objects: Map<String, Value>) -> Self {
        Self { objects }
    }

    /// Extract the `result.status` object from a full query response
    pub fn from_envelope(response: Value) -> Result<Self, StatusError> {
        let mut response = match response {
            Value::Object(map) => map,
            _ => return Err(StatusError::MissingResult),
        };

        let mut result = match response.remove("result") {
            Some(Value::Object(map)) => map,
            _ => return Err(StatusError::MissingResult),
        };

        match result.remove("status") {
            Some(Value::Object(objects)) => Ok(Self { objects }),
            Some(other) => Err(StatusError::StatusNotObject(json_type(&other))),
            None => Err(StatusError::MissingStatus),
        }
    }

    /// Look up `object.field`; absent objects and fields both yield `None`
    pub fn field(&self, object: &str, field: &str) -> Option<&Value> {
        self.objects.get(object)?.as_object()?.get(field)
    }

    pub fn objects(&self) -> &Map<String, Value> {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
