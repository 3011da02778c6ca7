//! Inbound port. The protocol adapter calls into the application.

use crate::domain::{DomainError, ToolResult};
use serde::Serialize;
use serde_json::Value;

/// Name, description and JSON Schema of one callable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool registry exposed to the host runtime.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// All tools this handler serves, in a stable order.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Invoke a tool. Every failure inside a known tool comes back as a failed
    /// `ToolResult`; `Err` is reserved for an unknown tool name.
    async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, DomainError>;
}
