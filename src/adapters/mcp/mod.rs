//! Model Context Protocol adapter. Serves the inbound ToolHandler over stdio via rmcp.

pub mod framing;
pub mod server;

pub use server::McpServer;
