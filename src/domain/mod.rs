//! Core domain layer. No external I/O dependencies.
//!
//! Entities, the tool result envelope and the error taxonomy live here. Dependencies flow inward.

pub mod entities;
pub mod envelope;
pub mod errors;

pub use entities::{
    Credentials, DeviceSettings, DirectReceipt, PhotoMode, SessionState, UploadStatus, UserId,
};
pub use envelope::ToolResult;
pub use errors::DomainError;
