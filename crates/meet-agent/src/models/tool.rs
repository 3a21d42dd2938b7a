use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A remotely invocable operation offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON schema object describing the parameters the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Build a tool, forcing the schema into an object with `type` and `properties`
    pub fn with_normalized_schema<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let mut schema = match input_schema {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        schema
            .entry("type")
            .or_insert_with(|| Value::String("object".to_string()));
        schema.entry("properties").or_insert_with(|| json!({}));

        Tool::new(name, description, Value::Object(schema))
    }
}

/// A tool call request that the invoker can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and arguments
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
