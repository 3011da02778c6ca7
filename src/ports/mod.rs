//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by the MCP adapter into the application
//! - Outbound: Called by the application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::{ToolDescriptor, ToolHandler};
pub use outbound::{AuthPort, InstagramGateway, SessionLoad, SessionStorePort};
