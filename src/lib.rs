//! insta-dm-mcp: Instagram direct-message tools served over MCP, with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
