// abacus-core/src/lib.rs

#![doc = include_str!("../../README.md")]

pub mod api;
pub mod config;
pub mod errors;
pub mod session;
pub mod translate;


use anyhow::Result;
use serde_json::{Map, Value};

pub use async_trait::async_trait;

pub use config::{ChatConfig, ModelConfig, ServerConfig};
pub use errors::SessionError;
pub use mcp::client::{McpConnection, ServerIdentity};
pub use models::chat::{ApiResponse, ChatMessage, Choice};
pub use models::descriptor::{ArgumentSpec, ToolDescriptor};
pub use models::tools::{
    ToolCall, ToolDefinition, ToolFunction, ToolParameter, ToolParameterType,
    ToolParametersDefinition,
};
pub use session::{ChatSession, TurnPhase};
pub use translate::openai_tool_from_descriptor;

/// Dispatch seam between the conversation loop and the tool server.
///
/// The production implementation is [`McpConnection`]; tests substitute a
/// scripted backend. Arguments are the already-decoded JSON object from the
/// tool-call intent; the result is the text destined for the tool message.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<String>;
}

// --- Modules ---
pub mod mcp {
    pub mod client;
}

pub mod models {
    pub mod chat;
    pub mod descriptor;
    pub mod tools;
}
