// abacus-core/src/errors.rs
use thiserror::Error;

/// Errors that can end a chat session.
///
/// Per-tool failures (bad arguments, a failed invocation) are not represented
/// here: those are fed back to the model as tool messages and the turn
/// continues. Anything that surfaces as a `SessionError` is terminal.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Error related to configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error during interaction with the completion endpoint.
    #[error("API Error: {0}")]
    Api(#[source] anyhow::Error),

    /// Error related to the MCP connection.
    #[error("MCP Error: {0}")]
    Mcp(#[source] anyhow::Error),
}

impl SessionError {
    pub fn config(msg: impl Into<String>) -> Self {
        SessionError::Config(msg.into())
    }
}
