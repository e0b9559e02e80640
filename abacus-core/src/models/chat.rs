// abacus-core/src/models/chat.rs
use super::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// Represents a message in the chat history sequence sent to/from the model.
/// Can represent system, user, assistant, or tool messages.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
    /// Function name, echoed back on tool-role messages.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl ChatMessage {
    /// A user-role message with the given content.
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A system-role message with the given content.
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// An assistant-role message carrying plain text.
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A tool-role message answering the tool call with the given id.
    pub fn tool(call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Represents one of the choices returned by the completion endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Represents the overall structure of a completion endpoint response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiResponse {
    pub id: String,
    pub choices: Vec<Choice>,
}
