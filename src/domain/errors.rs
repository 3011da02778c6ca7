//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or invalid configuration (e.g. credentials). Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login rejected, session revoked, or network failure while authenticating.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote operation failed (HTTP error, unexpected response, rate limit).
    #[error("Instagram API error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}
