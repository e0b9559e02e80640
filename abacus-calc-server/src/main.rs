// abacus-calc-server/src/main.rs
use anyhow::Result;
use rmcp::{model::*, service::*, transport::io, Error as McpError};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// Helper to create a JSON schema object for a tool
fn create_schema_object(
    properties: Vec<(&str, Value)>,
    required: Vec<&str>,
) -> Arc<Map<String, Value>> {
    let props_map: Map<String, Value> = properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let req_vec: Vec<Value> = required
        .into_iter()
        .map(|s| Value::String(s.to_string()))
        .collect();

    let schema = json!({
        "type": "object",
        "properties": props_map,
        "required": req_vec
    });
    let map = match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Arc::new(map)
}

fn operand_schema(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// Pulls a named operand out of the argument map. Operands arrive as strings
/// and must parse as numbers.
fn require_operand(args_map: &Map<String, Value>, name: &str) -> Result<f64, McpError> {
    let value = args_map
        .get(name)
        .ok_or_else(|| McpError::invalid_params(format!("Missing required argument: {}", name), None))?;
    let raw = value.as_str().ok_or_else(|| {
        McpError::invalid_params(format!("Argument '{}' must be a string", name), None)
    })?;
    raw.trim().parse::<f64>().map_err(|_| {
        McpError::invalid_params(
            format!("Argument '{}' is not a number: '{}'", name, raw),
            None,
        )
    })
}

fn text_result(value: f64) -> CallToolResult {
    let raw_content = RawContent::Text(RawTextContent {
        // f64 Display drops the trailing ".0" for whole numbers.
        text: value.to_string(),
    });
    let annotated = Annotated {
        raw: raw_content,
        annotations: None,
    };
    CallToolResult {
        content: vec![annotated],
        is_error: Some(false),
    }
}

#[derive(Debug, Clone)]
struct CalcServer {
    peer: Arc<Mutex<Option<Peer<RoleServer>>>>,
    tools: Arc<HashMap<String, Tool>>,
}

impl CalcServer {
    fn new() -> Self {
        let mut tools = HashMap::new();

        let add_schema = create_schema_object(
            vec![
                ("a", operand_schema("First number, as a string (e.g. '2').")),
                ("b", operand_schema("Second number, as a string (e.g. '3').")),
            ],
            vec!["a", "b"],
        );
        tools.insert(
            "add".to_string(),
            Tool {
                name: "add".into(),
                description: "Adds two numbers and returns the sum.".into(),
                input_schema: add_schema,
            },
        );

        let subtract_schema = create_schema_object(
            vec![
                ("a", operand_schema("Number to subtract from, as a string.")),
                ("b", operand_schema("Number to subtract, as a string.")),
            ],
            vec!["a", "b"],
        );
        tools.insert(
            "subtract".to_string(),
            Tool {
                name: "subtract".into(),
                description: "Subtracts the second number from the first and returns the difference.".into(),
                input_schema: subtract_schema,
            },
        );

        Self {
            peer: Arc::new(Mutex::new(None)),
            tools: Arc::new(tools),
        }
    }

    async fn handle_add(&self, args_map: Map<String, Value>) -> Result<CallToolResult, McpError> {
        let a = require_operand(&args_map, "a")?;
        let b = require_operand(&args_map, "b")?;
        Ok(text_result(a + b))
    }

    async fn handle_subtract(
        &self,
        args_map: Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        let a = require_operand(&args_map, "a")?;
        let b = require_operand(&args_map, "b")?;
        Ok(text_result(a - b))
    }

    fn handle_tool_call(
        &self,
        params: CallToolRequestParam,
    ) -> Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send + '_>> {
        let args_map = params.arguments.unwrap_or_default();
        match params.name.as_ref() {
            "add" => Box::pin(self.handle_add(args_map)),
            "subtract" => Box::pin(self.handle_subtract(args_map)),
            _ => Box::pin(async { Err(McpError::method_not_found::<CallToolRequestMethod>()) }),
        }
    }
}

impl Service<RoleServer> for CalcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(true),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "abacus-calc-server".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: None,
        }
    }

    fn get_peer(&self) -> Option<Peer<RoleServer>> {
        self.peer.lock().unwrap().clone()
    }

    fn set_peer(&mut self, peer: Peer<RoleServer>) {
        *self.peer.lock().unwrap() = Some(peer);
    }

    #[allow(refining_impl_trait)]
    fn handle_request(
        &self,
        request: ClientRequest,
        _context: RequestContext<RoleServer>,
    ) -> Pin<Box<dyn Future<Output = Result<ServerResult, McpError>> + Send + '_>> {
        let self_clone = self.clone();
        Box::pin(async move {
            match request {
                ClientRequest::ListToolsRequest(Request { .. }) => {
                    Ok(ServerResult::ListToolsResult(ListToolsResult {
                        tools: self_clone.tools.values().cloned().collect(),
                        next_cursor: None,
                    }))
                }
                ClientRequest::CallToolRequest(Request { params, .. }) => self_clone
                    .handle_tool_call(params)
                    .await
                    .map(ServerResult::CallToolResult),
                _ => Err(McpError::method_not_found::<InitializeResultMethod>()),
            }
        })
    }

    #[allow(refining_impl_trait)]
    fn handle_notification(
        &self,
        _notification: ClientNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), McpError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let server = CalcServer::new();
    let transport = io::stdio();
    let ct = CancellationToken::new();

    // Startup message to stderr; stdout belongs to the protocol.
    eprintln!("Starting calculator MCP server...");

    if let Err(e) = server.serve_with_ct(transport, ct.clone()).await {
        eprintln!("Server loop failed: {}", e);
    }

    // Keep the process alive until cancellation is requested. serve_with_ct
    // can return once the client disconnects after initialization.
    ct.cancelled().await;

    eprintln!("Calculator MCP server stopped.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn result_text(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(t) => &t.text,
            other => panic!("expected text content, got {:?}", other),
        }
    }

    #[test]
    fn operand_parsing() {
        let map = args(&[("a", json!("2.5")), ("b", json!(" 3 "))]);
        assert_eq!(require_operand(&map, "a").unwrap(), 2.5);
        assert_eq!(require_operand(&map, "b").unwrap(), 3.0);

        let missing = require_operand(&map, "c").unwrap_err();
        assert!(missing.to_string().contains("Missing required argument"));

        let map = args(&[("a", json!(2))]);
        let non_string = require_operand(&map, "a").unwrap_err();
        assert!(non_string.to_string().contains("must be a string"));

        let map = args(&[("a", json!("two"))]);
        let unparseable = require_operand(&map, "a").unwrap_err();
        assert!(unparseable.to_string().contains("is not a number"));
    }

    #[tokio::test]
    async fn add_formats_whole_numbers_without_decimal() {
        let server = CalcServer::new();
        let result = server
            .handle_add(args(&[("a", json!("2")), ("b", json!("2"))]))
            .await
            .unwrap();
        assert_eq!(result_text(&result), "4");
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn subtract_keeps_fractional_results() {
        let server = CalcServer::new();
        let result = server
            .handle_subtract(args(&[("a", json!("1")), ("b", json!("2.5"))]))
            .await
            .unwrap();
        assert_eq!(result_text(&result), "-1.5");
    }

    #[test]
    fn schemas_require_both_operands() {
        let server = CalcServer::new();
        for name in ["add", "subtract"] {
            let schema = &server.tools[name].input_schema;
            assert_eq!(schema["type"], json!("object"));
            assert_eq!(schema["required"], json!(["a", "b"]));
            assert!(schema["properties"]["a"].is_object());
            assert!(schema["properties"]["b"].is_object());
        }
    }
}
