// abacus-core/src/mcp/client.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rmcp::{
    model::*,
    service::{Peer, RoleClient},
    transport::TokioChildProcess,
};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fs::File;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::models::descriptor::ToolDescriptor;
use crate::ToolBackend;

const SERVER_STDERR_LOG: &str = "abacus-mcp-server.stderr.log";

/// Name and version the server advertised during the MCP handshake.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

struct ActiveConnection {
    peer: Peer<RoleClient>,
    identity: ServerIdentity,
}

/// A connection to one MCP tool server, spawned as a child process and
/// spoken to over its stdio.
///
/// The connection is the session's one scoped resource: [`connect`] spawns
/// the server and performs the handshake, [`shutdown`] releases it. Shutdown
/// runs on every exit path, including errors.
///
/// [`connect`]: McpConnection::connect
/// [`shutdown`]: McpConnection::shutdown
pub struct McpConnection {
    server_command: String,
    server_args: Vec<String>,
    connection: Arc<Mutex<Option<ActiveConnection>>>,
    ct: CancellationToken,
}

// The client side never serves requests of its own; tool servers only ever
// answer. rmcp still wants a Service for the handshake.
struct NoopClientService;

impl rmcp::service::Service<RoleClient> for NoopClientService {
    #[allow(refining_impl_trait)]
    fn handle_request(
        &self,
        _request: ServerRequest,
        _context: rmcp::service::RequestContext<RoleClient>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ClientResult, rmcp::Error>> + Send>,
    > {
        Box::pin(async { Err(rmcp::Error::method_not_found::<InitializeResultMethod>()) })
    }

    #[allow(refining_impl_trait)]
    fn handle_notification(
        &self,
        _notification: ServerNotification,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), rmcp::Error>> + Send>> {
        Box::pin(async { Ok(()) })
    }

    fn get_peer(&self) -> Option<Peer<RoleClient>> {
        None
    }

    fn set_peer(&mut self, _peer: Peer<RoleClient>) {}

    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

impl McpConnection {
    pub fn new(server_command: String, server_args: Vec<String>) -> Self {
        Self {
            server_command,
            server_args,
            connection: Arc::new(Mutex::new(None)),
            ct: CancellationToken::new(),
        }
    }

    /// Spawns the server process and performs the MCP handshake.
    ///
    /// Idempotent: a second call on an established connection returns the
    /// stored identity without spawning anything.
    pub async fn connect(&self) -> Result<ServerIdentity> {
        let mut guard = self.connection.lock().await;
        if let Some(active) = guard.as_ref() {
            trace!("MCP connection already established.");
            return Ok(active.identity.clone());
        }

        info!(command = %self.server_command, args = ?self.server_args, "Establishing MCP connection...");

        let mut cmd = Command::new(&self.server_command);
        cmd.args(&self.server_args);
        // Stdio carries the protocol; stderr goes to a log file so server
        // noise cannot corrupt the framing.
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        let stderr_path = std::env::temp_dir().join(SERVER_STDERR_LOG);
        match File::create(&stderr_path) {
            Ok(stderr_file) => {
                cmd.stderr(stderr_file);
            }
            Err(e) => {
                error!(error = %e, path = %stderr_path.display(), "Failed to open stderr log file, using pipe instead");
                cmd.stderr(std::process::Stdio::piped());
            }
        }

        debug!(command = ?cmd, "Prepared command for MCP server.");

        let transport = match TokioChildProcess::new(&mut cmd) {
            Ok(t) => {
                debug!("MCP server process spawned successfully.");
                t
            }
            Err(e) => {
                error!(command = ?cmd, error = %e, "Failed to create MCP server process");
                return Err(anyhow!("Failed to create MCP server process: {}", e));
            }
        };

        trace!("Attempting MCP handshake with serve_client_with_ct...");
        match rmcp::service::serve_client_with_ct(NoopClientService, transport, self.ct.clone())
            .await
        {
            Ok(running_service) => {
                let server_info = &running_service.peer_info().server_info;
                let identity = ServerIdentity {
                    name: server_info.name.clone(),
                    version: server_info.version.clone(),
                };
                debug!(server = %identity.name, version = %identity.version, "MCP handshake successful.");
                *guard = Some(ActiveConnection {
                    peer: running_service.peer().clone(),
                    identity: identity.clone(),
                });
                info!("MCP connection established.");
                Ok(identity)
            }
            Err(e) => {
                error!(error = %e, "Failed to establish MCP connection during handshake");
                Err(anyhow!("Failed to establish MCP connection: {}", e))
            }
        }
    }

    async fn active_guard(
        &self,
    ) -> Result<tokio::sync::MutexGuard<'_, Option<ActiveConnection>>> {
        let guard = self.connection.lock().await;
        if guard.is_none() {
            error!("Attempted to use MCP connection, but it is not established.");
            Err(anyhow!("MCP connection not established"))
        } else {
            Ok(guard)
        }
    }

    /// Lists the server's tools as boundary-validated descriptors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        trace!("Attempting to list tools...");
        let guard = self.active_guard().await?;
        let active = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Peer unavailable after lock"))?;
        debug!("Calling peer.list_all_tools().");
        let tools = active.peer.list_all_tools().await.map_err(|e| {
            error!(error = %e, "peer.list_all_tools() failed");
            anyhow!("Failed to list tools via MCP: {}", e)
        })?;
        Ok(tools.iter().map(ToolDescriptor::from_mcp).collect())
    }

    /// Invokes a tool and renders its result content as text.
    ///
    /// A result flagged `is_error` comes back as `Err` carrying the rendered
    /// text, so callers treat it like any other invocation failure.
    pub async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<String> {
        trace!(tool_name = %name, "Attempting to call tool...");
        let guard = self.active_guard().await?;
        let active = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Peer unavailable after lock"))?;
        let params = CallToolRequestParam {
            name: Cow::Owned(name.to_string()),
            arguments: Some(args),
        };
        debug!(?params, "Calling peer.call_tool().");
        let result = active.peer.call_tool(params).await.map_err(|e| {
            error!(tool_name = %name, error = %e, "peer.call_tool() failed");
            anyhow!("Failed to call tool '{}' via MCP: {}", name, e)
        })?;

        let is_error = result.is_error == Some(true);
        let rendered = if result.content.is_empty() {
            "<empty result>".to_string()
        } else {
            let parts: Vec<String> = result
                .content
                .into_iter()
                .map(|item| match item.raw {
                    RawContent::Text(text_content) => text_content.text,
                    other => serde_json::to_value(other)
                        .ok()
                        .and_then(|v| serde_json::to_string_pretty(&v).ok())
                        .unwrap_or_else(|| "<unrenderable content>".to_string()),
                })
                .collect();
            parts.join("\n")
        };

        if is_error {
            error!(tool_name = %name, result = %rendered, "Tool reported an error result");
            Err(anyhow!("{}", rendered))
        } else {
            Ok(rendered)
        }
    }

    /// Tears the connection down: drops the peer and cancels the service
    /// task, which closes the child's stdin and lets it exit.
    pub async fn shutdown(&self) {
        let mut guard = self.connection.lock().await;
        if guard.take().is_some() {
            info!("Shutting down MCP connection.");
        }
        self.ct.cancel();
    }
}

#[async_trait]
impl ToolBackend for McpConnection {
    async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<String> {
        McpConnection::call_tool(self, name, args).await
    }
}
