//! MCP server: an rmcp `ServerHandler` over the inbound `ToolHandler` port.
//!
//! `run` is generic over the host streams so production uses stdin/stdout and tests use
//! in-memory pipes. Frames pass through `framing` before reaching rmcp.

use crate::adapters::mcp::framing;
use crate::domain::{DomainError, ToolResult};
use crate::ports::{ToolDescriptor, ToolHandler};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, JsonObject, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler, ServiceExt};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const SERVER_NAME: &str = "Instagram DM MCP";

/// Guidance sent to the host in the `initialize` result.
pub const INSTRUCTIONS: &str = "You are an Instagram Direct Message assistant. Help the user send \
direct messages and photos to Instagram users by username. Respect user privacy and data \
security, and confirm the recipient before sending.";

/// In-process pipe capacity between the framing pumps and rmcp.
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Clone)]
pub struct McpServer {
    handler: Arc<dyn ToolHandler>,
}

impl McpServer {
    pub fn new(handler: Arc<dyn ToolHandler>) -> Self {
        Self { handler }
    }

    /// Serve one MCP session until the host closes `reader`.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<(), DomainError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (session_io, host_io) = tokio::io::duplex(PIPE_CAPACITY);
        let (from_server, to_server) = tokio::io::split(host_io);
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let inbound = tokio::spawn(framing::pump_inbound(reader, to_server, replies_tx));
        let outbound = tokio::spawn(framing::pump_outbound(
            BufReader::new(from_server),
            replies_rx,
            writer,
        ));

        let session = match ServiceExt::serve(self, tokio::io::split(session_io)).await {
            Ok(session) => session,
            Err(e) => {
                inbound.abort();
                outbound.abort();
                return Err(DomainError::Protocol(format!("MCP initialization failed: {}", e)));
            }
        };
        info!("MCP session initialized");

        let reason = session
            .waiting()
            .await
            .map_err(|e| DomainError::Protocol(format!("MCP session task failed: {}", e)))?;
        info!(?reason, "client closed the connection");

        // The session is over; stop reading the host even if it left its side open.
        inbound.abort();
        outbound
            .await
            .map_err(|e| DomainError::Protocol(format!("output task failed: {}", e)))?
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = SERVER_NAME.into();
        info.server_info.version = env!("CARGO_PKG_VERSION").into();
        info.instructions = Some(INSTRUCTIONS.into());
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.handler.tools().into_iter().map(to_tool).collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = %request.name, "tools/call");
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        match self.handler.call(&request.name, arguments).await {
            Ok(result) => Ok(call_tool_result(&result)),
            Err(DomainError::UnknownTool(name)) => Err(ErrorData::invalid_params(
                format!("Unknown tool: {}", name),
                None,
            )),
            Err(e) => Err(ErrorData::internal_error(e.to_string(), None)),
        }
    }
}

fn to_tool(descriptor: ToolDescriptor) -> Tool {
    let schema = match descriptor.input_schema {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    Tool::new(descriptor.name, descriptor.description, Arc::new(schema))
}

/// The single place where an envelope is serialized for the host: as JSON text content
/// and as structured content, with `isError` mirroring `!success`.
pub fn call_tool_result(result: &ToolResult) -> CallToolResult {
    let structured = serde_json::to_value(result).unwrap_or_else(|_| json!({ "success": false }));
    if result.success {
        CallToolResult::structured(structured)
    } else {
        CallToolResult::structured_error(structured)
    }
}
