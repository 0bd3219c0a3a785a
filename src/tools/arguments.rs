//! Validated tool call input handed to tool executors.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ParleyError;

/// Tool input that already passed schema validation and had defaults applied.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// A required string field.
    pub fn get_str(&self, key: &str) -> Result<&str, ParleyError> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ParleyError::InvalidState(format!("missing string argument '{key}'")))
    }

    /// The whole input as a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ParleyError> {
        T::deserialize(&self.value)
            .map_err(|e| ParleyError::InvalidState(format!("unreadable tool arguments: {e}")))
    }
}
