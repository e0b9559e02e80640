// abacus-core/src/api.rs

//! Single-shot requests to the OpenAI-style chat completions endpoint.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, to_value, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ChatConfig, ModelConfig};
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;

/// Posts one completion request and returns the parsed response.
///
/// The endpoint is called exactly once; a failed request or a non-success
/// status is returned to the caller as an error, carrying the status and
/// response body. There is deliberately no retry here: the session treats
/// completion failures as fatal.
pub async fn get_chat_completion(
    client: &Client,
    config: &ChatConfig,
    messages: Vec<ChatMessage>,
    tool_definitions: &[ToolDefinition],
) -> Result<ApiResponse> {
    let url_str = &config.model.endpoint;

    let request_body = build_openai_request(
        &config.model.model_name,
        messages,
        &config.model,
        tool_definitions,
    )?;

    debug!(
        "Request URL: {}\nRequest JSON: {}",
        url_str,
        serde_json::to_string_pretty(&request_body)?
    );

    let response = client
        .post(url_str)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", config.api_key))
        .json(&request_body)
        .send()
        .await
        .with_context(|| format!("Network error sending completion request to {}", url_str))?;

    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let error_text = response
            .text()
            .await
            .context("Failed to read API error response body")?;
        debug!(
            "API request failed. Status: {}, Headers: {:#?}, Body: {}",
            status, headers, error_text
        );
        return Err(anyhow!("API error: {} - {}", status, error_text));
    }

    let response_value: Value = response
        .json()
        .await
        .context("Failed to read API response body as JSON")?;

    let mut response_json_obj = if let Value::Object(map) = response_value.clone() {
        map
    } else {
        return Err(anyhow!(
            "API response was not a JSON object: {:?}",
            response_value
        ));
    };

    // Some OpenAI-compatible endpoints omit the response id.
    if !response_json_obj.contains_key("id") {
        let new_id = format!("chatcmpl-{}", Uuid::new_v4());
        debug!(
            "Added missing 'id' field to API response with value: {}",
            new_id
        );
        response_json_obj.insert("id".to_string(), json!(new_id));
    }

    match serde_json::from_value::<ApiResponse>(Value::Object(response_json_obj)) {
        Ok(api_response) => {
            if let Some(choice) = api_response.choices.first() {
                match &choice.message.tool_calls {
                    Some(tool_calls) => debug!("Response requests {} tool call(s)", tool_calls.len()),
                    None => debug!("Response carries no tool calls"),
                }
            } else {
                debug!("Response has empty 'choices' array");
            }
            Ok(api_response)
        }
        Err(e) => {
            debug!("Failed to deserialize API response: {:#?}", response_value);
            Err(anyhow!("Failed to deserialize API response").context(e))
        }
    }
}

fn build_openai_request(
    model_name: &str,
    messages: Vec<ChatMessage>,
    model_config: &ModelConfig,
    tool_definitions: &[ToolDefinition],
) -> Result<Value> {
    let mut request_map = serde_json::Map::new();
    request_map.insert("model".to_string(), json!(model_name));
    request_map.insert("messages".to_string(), to_value(messages)?);

    let tools_json: Vec<Value> = tool_definitions
        .iter()
        .map(|tool_def| {
            json!({
                "type": "function",
                "function": tool_def
            })
        })
        .collect();

    // The final per-turn request passes no tools at all; the model is
    // expected to answer in plain text then.
    if !tools_json.is_empty() {
        request_map.insert("tools".to_string(), Value::Array(tools_json));
        request_map.insert("tool_choice".to_string(), json!("auto"));
    }

    if let Some(parameters) = model_config.parameters.as_ref().and_then(|p| p.as_table()) {
        for (key, value) in parameters {
            let json_value = to_value(value.clone())
                .with_context(|| format!("Failed to convert TOML parameter '{}' to JSON", key))?;
            request_map.insert(key.clone(), json_value);
        }
    }
    Ok(Value::Object(request_map))
}
