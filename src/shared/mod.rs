//! Cross-cutting concerns: configuration, credentials, command line.

pub mod cli;
pub mod config;
