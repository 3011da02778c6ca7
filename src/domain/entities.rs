//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/IO types here; adapters map Instagram API payloads into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instagram login pair. Never persisted by this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Instagram numeric account id (`pk`). Kept as a string: the API returns it both
/// as a JSON number and as a string depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// Acknowledgement of a direct-message send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectReceipt {
    /// Remote message (item) id, when the API returns one.
    pub item_id: Option<String>,
    pub thread_id: Option<String>,
}

/// How `send_photo_message` delivers the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoMode {
    /// Upload and send before answering the call.
    Sync,
    /// Answer immediately; upload runs as a tracked background task.
    #[default]
    Background,
}

impl FromStr for PhotoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(PhotoMode::Sync),
            "background" | "async" | "asynchronous" => Ok(PhotoMode::Background),
            other => Err(format!(
                "unknown photo mode '{}' (expected 'sync' or 'background')",
                other
            )),
        }
    }
}

/// Lifecycle of a background photo upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Sent {
        direct_message_id: Option<String>,
        thread_id: Option<String>,
    },
    Failed {
        error: String,
    },
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Sent { .. } => "sent",
            UploadStatus::Failed { .. } => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }
}

/// Emulated Android device identity. Generated once per session record and reused
/// so Instagram sees a stable device across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub uuid: String,
    pub phone_id: String,
    pub client_session_id: String,
    pub advertising_id: String,
    pub android_device_id: String,
}

/// Persisted authentication state for one username.
///
/// Opaque outside the Instagram adapter and the session store. Loading one does not
/// prove it is still valid; the server may have revoked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub username: String,
    pub device: DeviceSettings,
    pub user_agent: String,
    /// Value of the `Authorization` header (`Bearer IGT:2:...`), set after login.
    #[serde(default)]
    pub authorization: Option<String>,
    /// Logged-in account id.
    #[serde(default)]
    pub ds_user_id: Option<String>,
    /// Machine id handed out by Instagram (`ig-set-x-mid`).
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl SessionState {
    /// True when the state carries both an authorization header and an account id.
    pub fn is_authenticated(&self) -> bool {
        self.authorization.as_deref().is_some_and(|a| !a.is_empty())
            && self.ds_user_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn user_id(&self) -> Option<UserId> {
        if self.is_authenticated() {
            self.ds_user_id.as_deref().map(UserId::from)
        } else {
            None
        }
    }
}
