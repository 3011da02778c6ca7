//! Infrastructure adapters. Implement ports.
//!
//! Instagram private API, session files, MCP transport. Map errors to DomainError.

pub mod instagram;
pub mod mcp;
pub mod persistence;
