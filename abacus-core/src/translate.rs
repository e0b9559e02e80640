// abacus-core/src/translate.rs

//! Translation of source-form tool descriptors into the function-call schema
//! the completion endpoint understands.

use std::collections::HashMap;
use tracing::warn;

use crate::models::descriptor::ToolDescriptor;
use crate::models::tools::{
    ToolDefinition, ToolParameter, ToolParameterType, ToolParametersDefinition,
};

/// Converts one tool descriptor into an OpenAI-style function schema.
///
/// This is total: every gap in the descriptor has a default instead of an
/// error. A missing tool name becomes `"unknown_tool"`, missing descriptions
/// become empty strings, and an argument without a name is dropped with a
/// diagnostic. All arguments are declared as strings; the descriptor carries
/// no type information worth trusting.
pub fn openai_tool_from_descriptor(descriptor: &ToolDescriptor) -> ToolDefinition {
    let tool_name = descriptor
        .name
        .clone()
        .unwrap_or_else(|| "unknown_tool".to_string());

    let mut properties = HashMap::new();
    let mut required = Vec::new();

    if let Some(arguments) = &descriptor.arguments {
        for arg in arguments {
            let arg_name = match &arg.name {
                Some(name) => name.clone(),
                None => {
                    warn!(tool = %tool_name, "Tool argument has no name, skipping.");
                    continue;
                }
            };
            properties.insert(
                arg_name.clone(),
                ToolParameter {
                    param_type: ToolParameterType::String,
                    description: arg.description.clone().unwrap_or_default(),
                },
            );
            if arg.required {
                required.push(arg_name);
            }
        }
    }

    ToolDefinition {
        name: tool_name,
        description: descriptor.description.clone().unwrap_or_default(),
        parameters: ToolParametersDefinition {
            param_type: "object".to_string(),
            properties,
            required,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptor::ArgumentSpec;

    fn arg(name: Option<&str>, description: Option<&str>, required: bool) -> ArgumentSpec {
        ArgumentSpec {
            name: name.map(String::from),
            description: description.map(String::from),
            required,
        }
    }

    #[test]
    fn translates_full_descriptor() {
        let descriptor = ToolDescriptor {
            name: Some("add".to_string()),
            description: Some("Adds two numbers.".to_string()),
            arguments: Some(vec![
                arg(Some("a"), Some("First operand"), true),
                arg(Some("b"), Some("Second operand"), true),
            ]),
        };
        let def = openai_tool_from_descriptor(&descriptor);
        assert_eq!(def.name, "add");
        assert_eq!(def.description, "Adds two numbers.");
        assert_eq!(def.parameters.param_type, "object");
        assert_eq!(def.parameters.properties.len(), 2);
        assert_eq!(def.parameters.required, vec!["a", "b"]);
        let a = &def.parameters.properties["a"];
        assert_eq!(a.param_type, ToolParameterType::String);
        assert_eq!(a.description, "First operand");
    }

    #[test]
    fn missing_name_becomes_unknown_tool() {
        let descriptor = ToolDescriptor {
            name: None,
            description: None,
            arguments: None,
        };
        let def = openai_tool_from_descriptor(&descriptor);
        assert_eq!(def.name, "unknown_tool");
        assert_eq!(def.description, "");
    }

    #[test]
    fn zero_arguments_yield_empty_schema() {
        let descriptor = ToolDescriptor {
            name: Some("ping".to_string()),
            description: Some("No-arg tool".to_string()),
            arguments: Some(vec![]),
        };
        let def = openai_tool_from_descriptor(&descriptor);
        assert!(def.parameters.properties.is_empty());
        assert!(def.parameters.required.is_empty());
    }

    #[test]
    fn unnamed_arguments_are_skipped() {
        let descriptor = ToolDescriptor {
            name: Some("mixed".to_string()),
            description: None,
            arguments: Some(vec![
                arg(None, Some("nameless"), true),
                arg(Some("kept"), None, false),
            ]),
        };
        let def = openai_tool_from_descriptor(&descriptor);
        assert_eq!(def.parameters.properties.len(), 1);
        assert!(def.parameters.properties.contains_key("kept"));
        // The skipped argument must not leak into the required list either.
        assert!(def.parameters.required.is_empty());
        assert_eq!(def.parameters.properties["kept"].description, "");
    }

    #[test]
    fn required_names_keep_declaration_order_and_duplicates() {
        let descriptor = ToolDescriptor {
            name: Some("dup".to_string()),
            description: None,
            arguments: Some(vec![
                arg(Some("b"), None, true),
                arg(Some("a"), None, true),
                arg(Some("b"), None, true),
            ]),
        };
        let def = openai_tool_from_descriptor(&descriptor);
        // Properties collapse on name; required reflects the raw declarations.
        assert_eq!(def.parameters.properties.len(), 2);
        assert_eq!(def.parameters.required, vec!["b", "a", "b"]);
    }

    #[test]
    fn every_property_is_declared_string() {
        let descriptor = ToolDescriptor {
            name: Some("typed".to_string()),
            description: None,
            arguments: Some(vec![
                arg(Some("count"), Some("Looks numeric, still a string"), false),
                arg(Some("flag"), None, true),
            ]),
        };
        let def = openai_tool_from_descriptor(&descriptor);
        assert!(def
            .parameters
            .properties
            .values()
            .all(|p| p.param_type == ToolParameterType::String));
    }
}
