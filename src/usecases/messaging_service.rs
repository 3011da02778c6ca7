//! Direct-message use cases behind the `send_message` and `send_photo_message` tools.
//!
//! Every operation is a hard error boundary: validation, lookup and remote failures all
//! come back as a failed `ToolResult`, never as an `Err` or a panic. No retries; sending
//! twice sends twice.

use crate::domain::{DirectReceipt, DomainError, PhotoMode, ToolResult, UserId};
use crate::ports::InstagramGateway;
use crate::usecases::photo_uploads::PhotoUploadTracker;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct MessagingService {
    gateway: Arc<dyn InstagramGateway>,
    photo_mode: PhotoMode,
    uploads: PhotoUploadTracker,
}

impl MessagingService {
    pub fn new(
        gateway: Arc<dyn InstagramGateway>,
        photo_mode: PhotoMode,
        uploads: PhotoUploadTracker,
    ) -> Self {
        Self {
            gateway,
            photo_mode,
            uploads,
        }
    }

    pub fn uploads(&self) -> &PhotoUploadTracker {
        &self.uploads
    }

    /// Send a text DM to `recipient_username`. A whitespace-only message is still a message.
    pub async fn send_message(&self, recipient_username: &str, message: &str) -> ToolResult {
        if recipient_username.trim().is_empty() || message.is_empty() {
            return ToolResult::fail("Recipient username and message cannot be empty.");
        }

        match self.try_send_message(recipient_username, message).await {
            Ok(result) => result,
            Err(e) => {
                error!(recipient = recipient_username, error = %e, "failed to send message");
                ToolResult::fail(e.to_string())
            }
        }
    }

    async fn try_send_message(
        &self,
        recipient_username: &str,
        message: &str,
    ) -> Result<ToolResult, DomainError> {
        let Some(user_id) = self.resolve(recipient_username).await? else {
            return Ok(not_found(recipient_username));
        };
        let receipt = self.gateway.direct_send(message, &[user_id]).await?;
        Ok(match receipt {
            Some(receipt) => {
                info!(recipient = recipient_username, direct_message_id = ?receipt.item_id, "message sent");
                ToolResult::ok_with("Message sent to user.", receipt_data(&receipt))
            }
            None => {
                warn!(recipient = recipient_username, "message send not acknowledged");
                ToolResult::fail("Failed to send message.")
            }
        })
    }

    /// Send a local image as a DM. In background mode the call returns once the upload
    /// has been initiated; its outcome is available through the upload tracker.
    pub async fn send_photo_message(&self, recipient_username: &str, photo_path: &str) -> ToolResult {
        if recipient_username.trim().is_empty() || photo_path.is_empty() {
            return ToolResult::fail("Recipient username and photo path cannot be empty.");
        }
        let path = PathBuf::from(photo_path);
        if !is_existing_file(&path).await {
            return ToolResult::fail(format!("Photo file not found: {}", photo_path));
        }

        match self.try_send_photo(recipient_username, path).await {
            Ok(result) => result,
            Err(e) => {
                error!(recipient = recipient_username, photo_path, error = %e, "failed to send photo");
                ToolResult::fail(e.to_string())
            }
        }
    }

    async fn try_send_photo(
        &self,
        recipient_username: &str,
        path: PathBuf,
    ) -> Result<ToolResult, DomainError> {
        let Some(user_id) = self.resolve(recipient_username).await? else {
            return Ok(not_found(recipient_username));
        };

        match self.photo_mode {
            PhotoMode::Sync => {
                let receipt = self.gateway.direct_send_photo(&path, &[user_id]).await?;
                Ok(match receipt {
                    Some(receipt) => {
                        info!(recipient = recipient_username, direct_message_id = ?receipt.item_id, "photo sent");
                        ToolResult::ok_with("Photo sent to user.", receipt_data(&receipt))
                    }
                    None => {
                        warn!(recipient = recipient_username, "photo send not acknowledged");
                        ToolResult::fail("Failed to send photo.")
                    }
                })
            }
            PhotoMode::Background => {
                let gateway = Arc::clone(&self.gateway);
                let upload_id = self.uploads.spawn(gateway, recipient_username, user_id, path);
                Ok(ToolResult::ok_with(
                    "Photo message sending initiated.",
                    json!({ "upload_id": upload_id, "status": "pending" }),
                ))
            }
        }
    }

    async fn resolve(&self, recipient_username: &str) -> Result<Option<UserId>, DomainError> {
        self.gateway
            .user_id_from_username(recipient_username.trim())
            .await
    }
}

fn not_found(recipient_username: &str) -> ToolResult {
    ToolResult::fail(format!("User '{}' not found.", recipient_username))
}

fn receipt_data(receipt: &DirectReceipt) -> serde_json::Value {
    json!({
        "direct_message_id": receipt.item_id,
        "thread_id": receipt.thread_id,
    })
}

async fn is_existing_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
