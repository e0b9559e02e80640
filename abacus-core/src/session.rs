// abacus-core/src/session.rs

//! The conversation loop: one [`ChatSession`] per process, one
//! [`ChatSession::run_turn`] call per user input.
//!
//! A turn is a small state machine. The completion endpoint either answers
//! directly or hands back tool-call intents; intents are dispatched
//! sequentially over the tool backend, their results appended as tool
//! messages, and a follow-up completion (with no tools offered) produces the
//! text to display. Per-intent failures are folded into the tool messages so
//! the model can react; completion failures end the session.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::api;
use crate::config::ChatConfig;
use crate::errors::SessionError;
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::{ToolCall, ToolDefinition};
use crate::ToolBackend;

/// Content of the tool message synthesized when intent arguments do not
/// decode as a JSON object.
pub const INVALID_ARGUMENTS_MESSAGE: &str = "Error: invalid JSON argument format.";

/// In-turn states of the conversation loop.
#[derive(Debug)]
pub enum TurnPhase {
    /// Issue a completion request with the tool schemas attached.
    RequestingCompletion,
    /// Dispatch the intents the model returned, in order.
    DispatchingTools(Vec<ToolCall>),
    /// Issue the follow-up completion, with no tools offered.
    RequestingFinalCompletion,
    /// The turn is over; the payload is the text to display.
    DirectAnswer(String),
}

impl TurnPhase {
    /// Pure transition out of a tools-offered completion response.
    ///
    /// A non-empty tool-call list moves the turn into dispatch; anything
    /// else ends it with the message's text content.
    pub fn after_completion(message: &ChatMessage) -> TurnPhase {
        if let Some(tool_calls) = &message.tool_calls {
            if !tool_calls.is_empty() {
                return TurnPhase::DispatchingTools(tool_calls.clone());
            }
        }
        TurnPhase::DirectAnswer(message.content.clone().unwrap_or_default())
    }
}

/// Holds the conversation history and drives the per-turn state machine.
pub struct ChatSession {
    config: ChatConfig,
    http_client: reqwest::Client,
    backend: Arc<dyn ToolBackend>,
    tools: Vec<ToolDefinition>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Creates a session seeded with the configured system instruction.
    ///
    /// `tools` is the already-translated schema list; an empty list means
    /// the model is never offered tools and every turn is a direct answer.
    pub fn new(
        config: ChatConfig,
        backend: Arc<dyn ToolBackend>,
        tools: Vec<ToolDefinition>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client for chat session")?;
        let messages = vec![ChatMessage::system(&config.system_prompt)];
        Ok(Self {
            config,
            http_client,
            backend,
            tools,
            messages,
        })
    }

    /// The conversation history accumulated so far. Append-only; one entry
    /// per system/user/assistant/tool message in wire order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Runs one full turn for the given user input and returns the text to
    /// display.
    ///
    /// Exactly one tool-role message is appended per tool-call intent, in
    /// intent order, before the follow-up completion is issued. Argument
    /// decode failures and tool invocation failures become the content of
    /// those tool messages; the turn continues. Completion failures abort
    /// the turn with the user message (and any partial progress) already in
    /// the history.
    pub async fn run_turn(&mut self, user_input: &str) -> Result<String, SessionError> {
        self.messages.push(ChatMessage::user(user_input));
        let mut phase = TurnPhase::RequestingCompletion;

        loop {
            trace!(?phase, "Processing turn phase.");
            phase = match phase {
                TurnPhase::RequestingCompletion => {
                    debug!(
                        num_messages = self.messages.len(),
                        num_tools = self.tools.len(),
                        "Requesting completion."
                    );
                    let response = api::get_chat_completion(
                        &self.http_client,
                        &self.config,
                        self.messages.clone(),
                        &self.tools,
                    )
                    .await
                    .map_err(|e| SessionError::Api(e.context("Completion request failed")))?;
                    let message = first_choice_message(response)?;

                    let next = TurnPhase::after_completion(&message);
                    match &next {
                        TurnPhase::DispatchingTools(calls) => {
                            info!(count = calls.len(), "Model requested {} tool call(s).", calls.len());
                            // The intent message goes into the history as
                            // received, so the follow-up request shows the
                            // model its own call ids.
                            self.messages.push(message);
                        }
                        _ => {
                            debug!("Model answered directly without tool calls.");
                            self.messages
                                .push(ChatMessage::assistant(message.content.unwrap_or_default()));
                        }
                    }
                    next
                }
                TurnPhase::DispatchingTools(calls) => {
                    for call in &calls {
                        let rendered = self.dispatch_tool_call(call).await;
                        self.messages.push(ChatMessage::tool(
                            &call.id,
                            &call.function.name,
                            rendered,
                        ));
                    }
                    TurnPhase::RequestingFinalCompletion
                }
                TurnPhase::RequestingFinalCompletion => {
                    debug!("Requesting final completion with tool results.");
                    let response = api::get_chat_completion(
                        &self.http_client,
                        &self.config,
                        self.messages.clone(),
                        &[],
                    )
                    .await
                    .map_err(|e| SessionError::Api(e.context("Final completion request failed")))?;
                    let message = first_choice_message(response)?;
                    if message
                        .tool_calls
                        .as_ref()
                        .map_or(false, |calls| !calls.is_empty())
                    {
                        // Single tool round per turn: whatever the model
                        // wants now, it gets to say it in text.
                        warn!("Final completion requested further tool calls; ignoring them.");
                    }
                    let answer = message.content.unwrap_or_default();
                    self.messages.push(ChatMessage::assistant(&answer));
                    TurnPhase::DirectAnswer(answer)
                }
                TurnPhase::DirectAnswer(answer) => {
                    debug!("Turn completed.");
                    return Ok(answer);
                }
            };
        }
    }

    /// Dispatches one intent and renders whatever happened as the content of
    /// its tool message. Never fails: failures are text the model gets to
    /// see.
    async fn dispatch_tool_call(&self, call: &ToolCall) -> String {
        let tool_name = &call.function.name;
        debug!(tool_call_id = %call.id, tool_name = %tool_name, "Processing tool call.");
        trace!(arguments = %call.function.arguments, "Raw tool arguments.");

        let args: Map<String, Value> = match serde_json::from_str(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                error!(
                    tool_call_id = %call.id,
                    tool_name = %tool_name,
                    error = %e,
                    arguments = %call.function.arguments,
                    "Failed to decode tool arguments as a JSON object."
                );
                return INVALID_ARGUMENTS_MESSAGE.to_string();
            }
        };

        match self.backend.call_tool(tool_name, args).await {
            Ok(output) => {
                info!(tool_call_id = %call.id, tool_name = %tool_name, "Tool executed successfully.");
                trace!(output = %output, "Tool output.");
                output
            }
            Err(e) => {
                error!(tool_call_id = %call.id, tool_name = %tool_name, error = ?e, "Tool execution failed.");
                format!("Error executing tool '{}': {}", tool_name, e)
            }
        }
    }
}

fn first_choice_message(response: ApiResponse) -> Result<ChatMessage, SessionError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| SessionError::Api(anyhow!("Completion response contained no choices")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tools::ToolFunction;

    fn intent(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: ToolFunction {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn after_completion_moves_to_dispatch_on_intents() {
        let message = ChatMessage {
            role: "assistant".to_string(),
            tool_calls: Some(vec![intent("call_1", "add", "{}")]),
            ..Default::default()
        };
        match TurnPhase::after_completion(&message) {
            TurnPhase::DispatchingTools(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
            }
            other => panic!("Expected DispatchingTools, got {:?}", other),
        }
    }

    #[test]
    fn after_completion_treats_empty_intent_list_as_direct_answer() {
        let message = ChatMessage {
            role: "assistant".to_string(),
            content: Some("Four.".to_string()),
            tool_calls: Some(vec![]),
            ..Default::default()
        };
        match TurnPhase::after_completion(&message) {
            TurnPhase::DirectAnswer(text) => assert_eq!(text, "Four."),
            other => panic!("Expected DirectAnswer, got {:?}", other),
        }
    }

    #[test]
    fn after_completion_defaults_missing_content_to_empty() {
        let message = ChatMessage {
            role: "assistant".to_string(),
            ..Default::default()
        };
        match TurnPhase::after_completion(&message) {
            TurnPhase::DirectAnswer(text) => assert_eq!(text, ""),
            other => panic!("Expected DirectAnswer, got {:?}", other),
        }
    }
}
