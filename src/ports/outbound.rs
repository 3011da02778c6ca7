//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{DirectReceipt, DomainError, SessionState, UserId};
use std::path::{Path, PathBuf};

/// Instagram direct-messaging gateway.
#[async_trait::async_trait]
pub trait InstagramGateway: Send + Sync {
    /// Resolve a username to an account id. `Ok(None)` when no such user exists.
    async fn user_id_from_username(&self, username: &str) -> Result<Option<UserId>, DomainError>;

    /// Send a text DM. `Ok(None)` when the API did not acknowledge the send.
    async fn direct_send(
        &self,
        text: &str,
        recipients: &[UserId],
    ) -> Result<Option<DirectReceipt>, DomainError>;

    /// Upload a local image and send it as a DM. `Ok(None)` when not acknowledged.
    async fn direct_send_photo(
        &self,
        path: &Path,
        recipients: &[UserId],
    ) -> Result<Option<DirectReceipt>, DomainError>;
}

/// Authentication side of the Instagram client.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    /// Adopt a previously persisted session. Does not contact the server.
    async fn restore_session(&self, state: SessionState) -> Result<(), DomainError>;

    /// Account id of the current identity, if the client state is authenticated.
    async fn current_user_id(&self) -> Option<UserId>;

    /// Full username/password login against the server.
    async fn login(&self, username: &str, password: &str) -> Result<UserId, DomainError>;

    /// Snapshot of the current state for persistence.
    async fn export_session(&self) -> SessionState;
}

/// Outcome of reading a session record. Read/parse failures are data, not errors:
/// a bad record only means a full login is needed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLoad {
    Missing,
    Loaded(SessionState),
    Unreadable(String),
}

/// Per-username session persistence.
#[async_trait::async_trait]
pub trait SessionStorePort: Send + Sync {
    /// Deterministic location of the record for `username`.
    fn path_for(&self, username: &str) -> PathBuf;

    async fn load(&self, username: &str) -> SessionLoad;

    /// Write (overwrite) the record for `username`.
    async fn save(&self, username: &str, state: &SessionState) -> Result<(), DomainError>;
}
