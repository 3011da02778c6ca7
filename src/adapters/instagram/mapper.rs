//! Map Instagram private-API payloads to domain types and errors.

use crate::domain::{DirectReceipt, DomainError, UserId};
use serde::Deserialize;
use serde_json::Value;

/// Maximum length for error response bodies in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 300;

/// Error payload shared by most endpoints (`{"status":"fail","message":...}`).
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub two_factor_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub logged_in_user: Option<LoggedInUser>,
}

#[derive(Debug, Deserialize)]
pub struct LoggedInUser {
    pub pk: Value,
}

#[derive(Debug, Deserialize)]
pub struct UsernameInfoResponse {
    pub user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub pk: Value,
}

#[derive(Debug, Deserialize)]
pub struct DirectSendResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payload: Option<DirectPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DirectPayload {
    #[serde(default)]
    pub item_id: Option<Value>,
    #[serde(default)]
    pub thread_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RuploadResponse {
    #[serde(default)]
    pub upload_id: Option<Value>,
}

/// Render an id that may arrive as a JSON number or string.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn user_id_from_pk(pk: &Value) -> Option<UserId> {
    id_string(pk).map(UserId)
}

/// A send counts as acknowledged only with `status == "ok"`.
pub fn direct_receipt(resp: DirectSendResponse) -> Option<DirectReceipt> {
    if resp.status.as_deref() != Some("ok") {
        return None;
    }
    let payload = resp.payload;
    Some(DirectReceipt {
        item_id: payload
            .as_ref()
            .and_then(|p| p.item_id.as_ref())
            .and_then(id_string),
        thread_id: payload
            .as_ref()
            .and_then(|p| p.thread_id.as_ref())
            .and_then(id_string),
    })
}

/// True when a failed usernameinfo lookup means "no such user".
pub fn is_user_not_found(status: u16, body: &str) -> bool {
    if status == 404 {
        return true;
    }
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().contains("user not found"))
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated, {} total bytes)", head, body.len())
    }
}

/// Map a non-success response into a domain error.
pub fn api_error(status: u16, body: &str) -> DomainError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| truncate_body(body));

    if parsed.two_factor_required || parsed.error_type.as_deref() == Some("two_factor_required") {
        return DomainError::Auth("two-factor authentication is required for this account".into());
    }

    match parsed.error_type.as_deref() {
        Some("bad_password") => {
            return DomainError::Auth(format!("bad password: {}", message));
        }
        Some("invalid_user") => {
            return DomainError::Auth(format!("invalid username: {}", message));
        }
        Some("checkpoint_challenge_required") | Some("challenge_required") => {
            return DomainError::Auth(
                "challenge required: confirm the login in the Instagram app and retry".into(),
            );
        }
        Some("rate_limit_error") => {
            return DomainError::Gateway(format!("rate limited: {}", message));
        }
        _ => {}
    }

    match message.as_str() {
        "login_required" => {
            return DomainError::Auth("login required: session expired or revoked".into());
        }
        "challenge_required" | "checkpoint_required" => {
            return DomainError::Auth(
                "challenge required: confirm the login in the Instagram app and retry".into(),
            );
        }
        _ => {}
    }

    match status {
        401 | 403 => DomainError::Auth(format!("HTTP {}: {}", status, message)),
        404 => DomainError::NotFound(message),
        429 => DomainError::Gateway(format!("rate limited: {}", message)),
        _ => DomainError::Gateway(format!("HTTP {}: {}", status, message)),
    }
}
