//! Failures raised by live objects under test

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::live::ErrorObject;
use crate::value::Value;

/// A structured error, as raised by a live object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub name: String,
    pub message: String,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub stack: Option<String>,
}

impl ErrorRecord {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, file_name: impl Into<String>, line: u32, column: u32) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = Some(line);
        self.column_number = Some(column);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Plain-map copy that survives the object it came from.
    pub fn to_value(&self) -> Value {
        let optional_str = |s: &Option<String>| s.as_deref().map(Value::from).unwrap_or_default();
        let optional_num = |n: Option<u32>| n.map(Value::from).unwrap_or_default();
        Value::map_of([
            ("name", Value::from(self.name.as_str())),
            ("message", Value::from(self.message.as_str())),
            ("fileName", optional_str(&self.file_name)),
            ("lineNumber", optional_num(self.line_number)),
            ("columnNumber", optional_num(self.column_number)),
            ("stack", optional_str(&self.stack)),
        ])
    }
}

/// Anything a live object can throw.
#[derive(Debug, Clone, Error)]
pub enum Exception {
    #[error("{}: {}", .0.name, .0.message)]
    Error(ErrorRecord),

    #[error("uncaught {}", .0.to_simple_string())]
    Thrown(Value),
}

impl Exception {
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Exception::Error(ErrorRecord::new(name, message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error("TypeError", message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error("RangeError", message)
    }

    pub fn thrown(value: Value) -> Self {
        Exception::Thrown(value)
    }

    /// The structured record, when the thrown thing is an error.
    pub fn record(&self) -> Option<ErrorRecord> {
        match self {
            Exception::Error(record) => Some(record.clone()),
            Exception::Thrown(value) => value
                .downcast_object::<ErrorObject>()
                .map(|object| object.record().clone()),
        }
    }

    /// Detail value for the message log: errors are cloned into plain maps,
    /// other thrown values are kept as they are.
    pub fn to_detail(&self) -> Value {
        match (self.record(), self) {
            (Some(record), _) => record.to_value(),
            (None, Exception::Thrown(value)) => value.clone(),
            (None, Exception::Error(_)) => Value::Undefined,
        }
    }
}
