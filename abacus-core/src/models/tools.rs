// abacus-core/src/models/tools.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- Structs for model tool-call intents ---

/// Represents a tool call requested by the model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // Usually "function"
    pub function: ToolFunction,
}

/// Represents the function call details within a ToolCall.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolFunction {
    pub name: String,
    /// Arguments arrive as a JSON string from the model.
    pub arguments: String,
}

// --- Structs for tool schemas presented to the model ---

/// Defines the schema for a tool that can be presented to the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParametersDefinition,
}

/// Defines the parameters structure for a tool.
///
/// An empty `required` list is serialized rather than skipped; the completion
/// endpoint expects the key to be present even for argument-free tools.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParametersDefinition {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: HashMap<String, ToolParameter>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Defines a single parameter within a tool's schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
}

/// JSON Schema scalar type of a tool parameter on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}
