//! Tool registry. Implements ToolHandler by decoding arguments and routing to MessagingService.

use crate::domain::{DomainError, ToolResult};
use crate::ports::{ToolDescriptor, ToolHandler};
use crate::usecases::messaging_service::MessagingService;
use crate::usecases::photo_uploads::UploadSnapshot;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SEND_MESSAGE: &str = "send_message";
pub const SEND_PHOTO_MESSAGE: &str = "send_photo_message";
pub const PHOTO_UPLOAD_STATUS: &str = "photo_upload_status";
pub const CANCEL_PHOTO_UPLOAD: &str = "cancel_photo_upload";

#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    #[serde(default)]
    recipient_username: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SendPhotoArgs {
    #[serde(default)]
    recipient_username: String,
    #[serde(default)]
    photo_path: String,
}

#[derive(Debug, Deserialize)]
struct UploadIdArgs {
    #[serde(default)]
    upload_id: String,
}

pub struct ToolDispatcher {
    messaging: Arc<MessagingService>,
}

impl ToolDispatcher {
    pub fn new(messaging: Arc<MessagingService>) -> Self {
        Self { messaging }
    }

    fn decode<T: DeserializeOwned>(name: &str, arguments: Value) -> Result<T, ToolResult> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        serde_json::from_value(arguments).map_err(|e| {
            warn!(tool = name, error = %e, "invalid tool arguments");
            ToolResult::fail(format!("Invalid arguments for {}: {}", name, e))
        })
    }

    fn upload_result(snapshot: Option<UploadSnapshot>, upload_id: &str, message: &str) -> ToolResult {
        match snapshot {
            Some(s) => {
                let mut data = serde_json::to_value(&s.status).unwrap_or_else(|_| json!({}));
                data["upload_id"] = json!(s.upload_id);
                data["recipient_username"] = json!(s.recipient);
                ToolResult::ok_with(message, data)
            }
            None => ToolResult::fail(format!("Upload '{}' not found.", upload_id)),
        }
    }
}

#[async_trait::async_trait]
impl ToolHandler for ToolDispatcher {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: SEND_MESSAGE,
                description: "Send an Instagram direct message to a user by username.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "recipient_username": {
                            "type": "string",
                            "description": "Instagram username of the recipient."
                        },
                        "message": {
                            "type": "string",
                            "description": "The message text to send."
                        }
                    },
                    "required": ["recipient_username", "message"]
                }),
            },
            ToolDescriptor {
                name: SEND_PHOTO_MESSAGE,
                description: "Send a photo from a local file as an Instagram direct message. \
                              In background mode the call returns once sending is initiated; \
                              poll photo_upload_status with the returned upload_id for the outcome.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "recipient_username": {
                            "type": "string",
                            "description": "Instagram username of the recipient."
                        },
                        "photo_path": {
                            "type": "string",
                            "description": "Path to an existing local image file."
                        }
                    },
                    "required": ["recipient_username", "photo_path"]
                }),
            },
            ToolDescriptor {
                name: PHOTO_UPLOAD_STATUS,
                description: "Report the state of a background photo upload (pending, sent, failed, cancelled).",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "upload_id": {
                            "type": "string",
                            "description": "Id returned by send_photo_message."
                        }
                    },
                    "required": ["upload_id"]
                }),
            },
            ToolDescriptor {
                name: CANCEL_PHOTO_UPLOAD,
                description: "Cancel a pending background photo upload.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "upload_id": {
                            "type": "string",
                            "description": "Id returned by send_photo_message."
                        }
                    },
                    "required": ["upload_id"]
                }),
            },
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, DomainError> {
        debug!(tool = name, "tool call");
        let result = match name {
            SEND_MESSAGE => match Self::decode::<SendMessageArgs>(name, arguments) {
                Ok(args) => {
                    self.messaging
                        .send_message(&args.recipient_username, &args.message)
                        .await
                }
                Err(r) => r,
            },
            SEND_PHOTO_MESSAGE => match Self::decode::<SendPhotoArgs>(name, arguments) {
                Ok(args) => {
                    self.messaging
                        .send_photo_message(&args.recipient_username, &args.photo_path)
                        .await
                }
                Err(r) => r,
            },
            PHOTO_UPLOAD_STATUS => match Self::decode::<UploadIdArgs>(name, arguments) {
                Ok(args) if args.upload_id.trim().is_empty() => {
                    ToolResult::fail("Upload id cannot be empty.")
                }
                Ok(args) => {
                    let snap = self.messaging.uploads().status(args.upload_id.trim());
                    Self::upload_result(snap, &args.upload_id, "Upload status retrieved.")
                }
                Err(r) => r,
            },
            CANCEL_PHOTO_UPLOAD => match Self::decode::<UploadIdArgs>(name, arguments) {
                Ok(args) if args.upload_id.trim().is_empty() => {
                    ToolResult::fail("Upload id cannot be empty.")
                }
                Ok(args) => {
                    let snap = self.messaging.uploads().cancel(args.upload_id.trim());
                    Self::upload_result(snap, &args.upload_id, "Upload cancellation processed.")
                }
                Err(r) => r,
            },
            other => return Err(DomainError::UnknownTool(other.to_string())),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DirectReceipt, PhotoMode, UserId};
    use crate::ports::InstagramGateway;
    use crate::usecases::photo_uploads::PhotoUploadTracker;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGateway {
        sends: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InstagramGateway for CountingGateway {
        async fn user_id_from_username(&self, _u: &str) -> Result<Option<UserId>, DomainError> {
            Ok(Some(UserId::from("5")))
        }

        async fn direct_send(
            &self,
            _t: &str,
            _r: &[UserId],
        ) -> Result<Option<DirectReceipt>, DomainError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(Some(DirectReceipt {
                item_id: Some("m1".into()),
                thread_id: None,
            }))
        }

        async fn direct_send_photo(
            &self,
            _p: &Path,
            _r: &[UserId],
        ) -> Result<Option<DirectReceipt>, DomainError> {
            Ok(None)
        }
    }

    fn dispatcher(gw: Arc<CountingGateway>) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(MessagingService::new(
            gw,
            PhotoMode::Background,
            PhotoUploadTracker::default(),
        )))
    }

    #[test]
    fn test_tool_list_is_stable() {
        let d = dispatcher(Arc::new(CountingGateway::default()));
        let names: Vec<&str> = d.tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![SEND_MESSAGE, SEND_PHOTO_MESSAGE, PHOTO_UPLOAD_STATUS, CANCEL_PHOTO_UPLOAD]
        );
        let schema = serde_json::to_value(&d.tools()[0]).unwrap();
        assert_eq!(schema["inputSchema"]["required"][0], "recipient_username");
    }

    #[tokio::test]
    async fn test_send_message_routed() {
        let gw = Arc::new(CountingGateway::default());
        let d = dispatcher(gw.clone());
        let res = d
            .call(SEND_MESSAGE, json!({"recipient_username": "bob", "message": "hi"}))
            .await
            .unwrap();
        assert!(res.success);
        assert_eq!(gw.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_arguments_fail_validation() {
        let gw = Arc::new(CountingGateway::default());
        let d = dispatcher(gw.clone());
        let res = d.call(SEND_MESSAGE, Value::Null).await.unwrap();
        assert!(!res.success);
        assert_eq!(
            res.error.as_deref(),
            Some("Recipient username and message cannot be empty.")
        );
        assert_eq!(gw.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_argument_types_fail_envelope() {
        let d = dispatcher(Arc::new(CountingGateway::default()));
        let res = d
            .call(SEND_MESSAGE, json!({"recipient_username": 12, "message": "hi"}))
            .await
            .unwrap();
        assert!(!res.success);
        assert!(res.error.unwrap().starts_with("Invalid arguments for send_message"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error() {
        let d = dispatcher(Arc::new(CountingGateway::default()));
        let err = d.call("delete_account", json!({})).await.unwrap_err();
        assert_eq!(err, DomainError::UnknownTool("delete_account".into()));
    }

    #[tokio::test]
    async fn test_upload_status_unknown_id() {
        let d = dispatcher(Arc::new(CountingGateway::default()));
        let res = d
            .call(PHOTO_UPLOAD_STATUS, json!({"upload_id": "nope"}))
            .await
            .unwrap();
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("Upload 'nope' not found."));

        let res = d.call(CANCEL_PHOTO_UPLOAD, json!({})).await.unwrap();
        assert_eq!(res.error.as_deref(), Some("Upload id cannot be empty."));
    }
}
