use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AgentResult;

/// A capability declaration that can be offered to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the capability, unique within a registry
    pub name: String,
    /// A description of what the capability does
    pub description: String,
    /// JSON schema of the arguments the capability accepts
    pub input_schema: Value,
    /// JSON schema of the value the capability returns on success
    pub output_schema: Value,
}

impl Tool {
    /// Create a new declaration with the given name, description and schemas
    pub fn new<N, D>(name: N, description: D, input_schema: Value, output_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
        }
    }
}

/// A capability call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the capability to execute
    pub name: String,
    /// The arguments for the execution
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Every capability call yields exactly one of these, whatever happened underneath.
pub type CapabilityResult = AgentResult<Value>;

/// Render a result the way it is shown to the model: the success value as is, or `{ "error": ... }`.
pub fn result_to_value(result: &CapabilityResult) -> Value {
    match result {
        Ok(value) => value.clone(),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
