// abacus-core/src/models/descriptor.rs

//! Source-form tool descriptors as handed over by a tool server.
//!
//! Every field is optional: servers are not trusted to fill anything in, and
//! the translation into the completion endpoint's schema format has a
//! documented default for each gap. Validation of the raw MCP schema happens
//! once, here, at the boundary; downstream code works with these plain
//! structs only.

use serde_json::Value;

/// A tool as described by the tool server, before translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    pub arguments: Option<Vec<ArgumentSpec>>,
}

/// A single argument of a [`ToolDescriptor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
}

impl ToolDescriptor {
    /// Builds a descriptor from an MCP tool listing entry.
    ///
    /// The MCP side describes arguments as a JSON Schema object
    /// (`properties` + `required`); this flattens it into an ordered argument
    /// list. Property order follows the schema map's key order, so the
    /// derived list is deterministic for a given server.
    pub fn from_mcp(tool: &rmcp::model::Tool) -> Self {
        let schema = tool.input_schema.as_ref();
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let arguments = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(arg_name, prop)| ArgumentSpec {
                        name: Some(arg_name.clone()),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                        required: required.contains(&arg_name.as_str()),
                    })
                    .collect::<Vec<_>>()
            });

        ToolDescriptor {
            name: Some(tool.name.to_string()),
            description: Some(tool.description.to_string()),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn mcp_tool(schema: Value) -> rmcp::model::Tool {
        let map = match schema {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        rmcp::model::Tool {
            name: "add".into(),
            description: "Adds two numbers.".into(),
            input_schema: Arc::new(map),
        }
    }

    #[test]
    fn from_mcp_flattens_schema_properties() {
        let tool = mcp_tool(json!({
            "type": "object",
            "properties": {
                "a": { "type": "string", "description": "First operand" },
                "b": { "type": "string", "description": "Second operand" },
            },
            "required": ["a", "b"],
        }));
        let descriptor = ToolDescriptor::from_mcp(&tool);
        assert_eq!(descriptor.name.as_deref(), Some("add"));
        assert_eq!(descriptor.description.as_deref(), Some("Adds two numbers."));
        let args = descriptor.arguments.unwrap();
        assert_eq!(args.len(), 2);
        assert!(args.iter().all(|a| a.required));
        assert_eq!(args[0].name.as_deref(), Some("a"));
        assert_eq!(args[0].description.as_deref(), Some("First operand"));
    }

    #[test]
    fn from_mcp_handles_missing_properties() {
        let tool = mcp_tool(json!({ "type": "object" }));
        let descriptor = ToolDescriptor::from_mcp(&tool);
        assert_eq!(descriptor.arguments, None);
    }

    #[test]
    fn from_mcp_marks_optional_arguments() {
        let tool = mcp_tool(json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" },
            },
            "required": ["b"],
        }));
        let descriptor = ToolDescriptor::from_mcp(&tool);
        let args = descriptor.arguments.unwrap();
        let a = args.iter().find(|s| s.name.as_deref() == Some("a")).unwrap();
        let b = args.iter().find(|s| s.name.as_deref() == Some("b")).unwrap();
        assert!(!a.required);
        assert!(a.description.is_none());
        assert!(b.required);
    }
}
