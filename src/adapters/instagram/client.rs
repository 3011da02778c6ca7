//! Implements InstagramGateway over the Instagram private (mobile) API.
//!
//! One client per process, shared via Arc by the auth flow and the tool dispatcher.
//! Session state sits behind an RwLock; reqwest::Client is internally pooled.

use crate::adapters::instagram::{device, mapper};
use crate::domain::{DirectReceipt, DomainError, SessionState, UserId};
use crate::ports::InstagramGateway;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, Url};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default private API host.
pub const DEFAULT_API_BASE_URL: &str = "https://i.instagram.com";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`InstagramClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

/// Instagram private API client.
pub struct InstagramClient {
    http: reqwest::Client,
    base_url: String,
    pub(crate) state: RwLock<SessionState>,
}

impl InstagramClient {
    /// Create an unauthenticated client with a fresh device identity for `username`.
    pub fn new(username: &str, options: ClientOptions) -> Result<Self, DomainError> {
        let mut builder = reqwest::Client::builder().timeout(options.timeout);
        if let Some(proxy) = options.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| DomainError::Config(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| DomainError::Config(format!("build HTTP client: {}", e)))?;

        let state = SessionState {
            username: username.to_string(),
            device: device::generate_device(),
            user_agent: options
                .user_agent
                .unwrap_or_else(|| device::DEFAULT_USER_AGENT.to_string()),
            authorization: None,
            ds_user_id: None,
            mid: None,
            last_login: None,
        };

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            state: RwLock::new(state),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL from path segments, each percent-encoded so it cannot leave its segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            DomainError::Config(format!("invalid API base URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                DomainError::Config(format!("API base URL '{}' cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn http_post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Attach the headers the Android app sends with every request.
    pub(crate) async fn with_app_headers(&self, req: RequestBuilder) -> RequestBuilder {
        let state = self.state.read().await;
        let mut req = req
            .header("User-Agent", state.user_agent.as_str())
            .header("X-IG-App-Locale", device::LOCALE)
            .header("X-IG-Device-Locale", device::LOCALE)
            .header("X-IG-Mapped-Locale", device::LOCALE)
            .header(
                "X-Pigeon-Session-Id",
                format!("UFS-{}-0", state.device.client_session_id),
            )
            .header("X-IG-Connection-Type", "WIFI")
            .header("X-IG-Capabilities", device::CAPABILITIES)
            .header("X-IG-App-ID", device::APP_ID)
            .header("X-IG-Device-ID", state.device.uuid.as_str())
            .header("X-IG-Android-ID", state.device.android_device_id.as_str())
            .header("X-FB-HTTP-Engine", "Liger")
            .header("Accept-Language", "en-US");
        if let Some(auth) = state.authorization.as_deref() {
            req = req.header("Authorization", auth);
        }
        if let Some(id) = state.ds_user_id.as_deref() {
            req = req.header("IG-U-DS-USER-ID", id);
        }
        if let Some(mid) = state.mid.as_deref() {
            req = req.header("X-MID", mid);
        }
        req
    }

    /// Pick up session updates the server pushes through `ig-set-*` headers.
    pub(crate) async fn absorb_headers(&self, headers: &HeaderMap) {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let authorization = get("ig-set-authorization").filter(|a| !a.ends_with(':'));
        let ds_user_id = get("ig-set-ig-u-ds-user-id").filter(|id| !id.is_empty() && id != "0");
        let mid = get("ig-set-x-mid").filter(|m| !m.is_empty());
        if authorization.is_none() && ds_user_id.is_none() && mid.is_none() {
            return;
        }
        let mut state = self.state.write().await;
        if let Some(a) = authorization {
            state.authorization = Some(a);
        }
        if let Some(id) = ds_user_id {
            state.ds_user_id = Some(id);
        }
        if let Some(m) = mid {
            state.mid = Some(m);
        }
    }

    /// Send the request, absorb session headers, and return status and body.
    pub(crate) async fn execute(&self, req: RequestBuilder) -> Result<(u16, String), DomainError> {
        let resp: Response = self
            .with_app_headers(req)
            .await
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("HTTP request failed: {}", e)))?;
        self.absorb_headers(resp.headers()).await;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| DomainError::Gateway(format!("read response body: {}", e)))?;
        Ok((status, body))
    }

    /// Like `execute`, but non-2xx statuses become domain errors.
    async fn execute_ok(&self, req: RequestBuilder) -> Result<String, DomainError> {
        let (status, body) = self.execute(req).await?;
        if !(200..300).contains(&status) {
            warn!(status, body = %body.chars().take(200).collect::<String>(), "Instagram API returned error");
            return Err(mapper::api_error(status, &body));
        }
        Ok(body)
    }

    fn recipient_users(recipients: &[UserId]) -> String {
        let ids: Vec<&str> = recipients.iter().map(|r| r.0.as_str()).collect();
        format!("[[{}]]", ids.join(","))
    }

    async fn require_login(&self) -> Result<(), DomainError> {
        if self.state.read().await.is_authenticated() {
            Ok(())
        } else {
            Err(DomainError::Auth("client is not logged in".into()))
        }
    }

    /// Upload image bytes to the rupload endpoint. Returns the upload id.
    async fn rupload_photo(&self, path: &Path) -> Result<String, DomainError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::Io(format!("read {}: {}", path.display(), e)))?;

        let upload_id = Utc::now().timestamp_millis().to_string();
        let suffix: u64 = rand::thread_rng().gen_range(1_000_000_000..10_000_000_000);
        let upload_name = format!("{}_0_{}", upload_id, suffix);
        let rupload_params = json!({
            "retry_context": r#"{"num_step_auto_retry":0,"num_reupload":0,"num_step_manual_retry":0}"#,
            "media_type": "1",
            "xsharing_user_ids": "[]",
            "upload_id": upload_id,
            "image_compression": r#"{"lib_name":"moz","lib_version":"3.1.m","quality":"80"}"#,
        });

        let len = bytes.len();
        let req = self
            .http
            .post(self.url(&format!("rupload_igphoto/{}", upload_name)))
            .header("X-Instagram-Rupload-Params", rupload_params.to_string())
            .header("X_FB_PHOTO_WATERFALL_ID", Uuid::new_v4().to_string())
            .header("X-Entity-Type", image_content_type(path))
            .header("X-Entity-Name", upload_name.as_str())
            .header("X-Entity-Length", len.to_string())
            .header("Offset", "0")
            .header("Content-Type", "application/octet-stream")
            .body(bytes);

        let body = self.execute_ok(req).await?;
        let resp: mapper::RuploadResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Gateway(format!("parse upload response: {}", e)))?;
        let id = resp
            .upload_id
            .as_ref()
            .and_then(mapper::id_string)
            .unwrap_or(upload_id);
        debug!(upload_id = %id, bytes = len, "photo uploaded");
        Ok(id)
    }
}

/// Instagram usernames: 1 to 30 characters from `[A-Za-z0-9._]`.
fn is_valid_username(username: &str) -> bool {
    (1..=30).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Entity type for the rupload header, from the file extension.
fn image_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[async_trait]
impl InstagramGateway for InstagramClient {
    async fn user_id_from_username(&self, username: &str) -> Result<Option<UserId>, DomainError> {
        let username = username.trim().trim_start_matches('@').to_ascii_lowercase();
        if !is_valid_username(&username) {
            debug!(username = %username, "not a valid Instagram username");
            return Ok(None);
        }
        let url = self.endpoint(&["api", "v1", "users", &username, "usernameinfo", ""])?;
        let (status, body) = self.execute(self.http.get(url)).await?;

        if !(200..300).contains(&status) {
            if mapper::is_user_not_found(status, &body) {
                debug!(username = %username, "user not found");
                return Ok(None);
            }
            return Err(mapper::api_error(status, &body));
        }

        let info: mapper::UsernameInfoResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Gateway(format!("parse usernameinfo response: {}", e)))?;
        Ok(info.user.as_ref().and_then(|u| mapper::user_id_from_pk(&u.pk)))
    }

    async fn direct_send(
        &self,
        text: &str,
        recipients: &[UserId],
    ) -> Result<Option<DirectReceipt>, DomainError> {
        self.require_login().await?;
        let client_context = Uuid::new_v4().to_string();
        let device_uuid = self.state.read().await.device.uuid.clone();
        let form = [
            ("action", "send_item".to_string()),
            ("is_shh_mode", "0".to_string()),
            ("send_attribution", "direct_thread".to_string()),
            ("client_context", client_context.clone()),
            ("mutation_token", client_context.clone()),
            ("offline_threading_id", client_context),
            ("_uuid", device_uuid),
            ("recipient_users", Self::recipient_users(recipients)),
            ("text", text.to_string()),
        ];
        let req = self
            .http
            .post(self.url("api/v1/direct_v2/threads/broadcast/text/"))
            .form(&form);

        let body = self.execute_ok(req).await?;
        let resp: mapper::DirectSendResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Gateway(format!("parse direct send response: {}", e)))?;
        let receipt = mapper::direct_receipt(resp);
        info!(
            recipients = recipients.len(),
            acknowledged = receipt.is_some(),
            "direct text sent"
        );
        Ok(receipt)
    }

    async fn direct_send_photo(
        &self,
        path: &Path,
        recipients: &[UserId],
    ) -> Result<Option<DirectReceipt>, DomainError> {
        self.require_login().await?;
        let upload_id = self.rupload_photo(path).await?;

        let client_context = Uuid::new_v4().to_string();
        let device_uuid = self.state.read().await.device.uuid.clone();
        let form = [
            ("action", "send_item".to_string()),
            ("send_attribution", "inbox".to_string()),
            ("client_context", client_context.clone()),
            ("mutation_token", client_context),
            ("_uuid", device_uuid),
            ("allow_full_aspect_ratio", "true".to_string()),
            ("upload_id", upload_id),
            ("recipient_users", Self::recipient_users(recipients)),
        ];
        let req = self
            .http
            .post(self.url("api/v1/direct_v2/threads/broadcast/configure_photo/"))
            .form(&form);

        let body = self.execute_ok(req).await?;
        let resp: mapper::DirectSendResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Gateway(format!("parse configure_photo response: {}", e)))?;
        let receipt = mapper::direct_receipt(resp);
        info!(
            path = %path.display(),
            recipients = recipients.len(),
            acknowledged = receipt.is_some(),
            "direct photo sent"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> InstagramClient {
        InstagramClient::new(
            "alice",
            ClientOptions {
                base_url: "https://example.test/".into(),
                ..ClientOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let c = client();
        assert_eq!(
            c.url("/api/v1/accounts/login/"),
            "https://example.test/api/v1/accounts/login/"
        );
    }

    #[test]
    fn test_recipient_users_format() {
        let ids = vec![UserId::from("1"), UserId::from("22")];
        assert_eq!(InstagramClient::recipient_users(&ids), "[[1,22]]");
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Path::new("a.PNG")), "image/png");
        assert_eq!(image_content_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(image_content_type(Path::new("noext")), "image/jpeg");
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let err = InstagramClient::new(
            "alice",
            ClientOptions {
                proxy: Some("ftp://proxy.example:21".into()),
                ..ClientOptions::default()
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[tokio::test]
    async fn test_absorb_headers_updates_session() {
        let c = client();
        let mut headers = HeaderMap::new();
        headers.insert(
            "ig-set-authorization",
            HeaderValue::from_static("Bearer IGT:2:eyJ0b2tlbiI6MX0="),
        );
        headers.insert("ig-set-ig-u-ds-user-id", HeaderValue::from_static("42"));
        headers.insert("ig-set-x-mid", HeaderValue::from_static("mid-9"));
        c.absorb_headers(&headers).await;

        let state = c.state.read().await;
        assert!(state.is_authenticated());
        assert_eq!(state.ds_user_id.as_deref(), Some("42"));
        assert_eq!(state.mid.as_deref(), Some("mid-9"));
    }

    #[tokio::test]
    async fn test_absorb_ignores_cleared_authorization() {
        let c = client();
        let mut headers = HeaderMap::new();
        headers.insert("ig-set-authorization", HeaderValue::from_static("Bearer IGT:2:"));
        c.absorb_headers(&headers).await;
        assert!(c.state.read().await.authorization.is_none());
    }

    #[tokio::test]
    async fn test_send_requires_login() {
        let c = client();
        let err = c
            .direct_send("hi", &[UserId::from("1")])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Auth(_)));
    }

    #[test]
    fn test_username_charset() {
        assert!(is_valid_username("alice.b_2"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("a/b"));
        assert!(!is_valid_username("../../accounts/current_user/?edit=true#"));
        assert!(!is_valid_username(&"a".repeat(31)));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = client()
            .endpoint(&["api", "v1", "users", "a/b?c#d", "usernameinfo", ""])
            .unwrap();
        assert_eq!(url.path(), "/api/v1/users/a%2Fb%3Fc%23d/usernameinfo/");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    async fn mock_client(server: &MockServer) -> InstagramClient {
        InstagramClient::new(
            "alice",
            ClientOptions {
                base_url: server.uri(),
                ..ClientOptions::default()
            },
        )
        .unwrap()
    }

    async fn logged_in_client(server: &MockServer) -> InstagramClient {
        let c = mock_client(server).await;
        {
            let mut state = c.state.write().await;
            state.authorization = Some("Bearer IGT:2:tok".into());
            state.ds_user_id = Some("42".into());
        }
        c
    }

    fn ack_body() -> serde_json::Value {
        json!({
            "action": "item_ack",
            "status_code": "200",
            "payload": {"client_context": "ctx", "item_id": "3061", "thread_id": "3400", "timestamp": "1"},
            "status": "ok"
        })
    }

    #[tokio::test]
    async fn test_lookup_resolves_numeric_pk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/bob/usernameinfo/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"user": {"pk": 1234, "username": "bob"}, "status": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let c = mock_client(&server).await;
        assert_eq!(
            c.user_id_from_username(" @Bob ").await.unwrap(),
            Some(UserId::from("1234"))
        );
    }

    #[tokio::test]
    async fn test_lookup_missing_user_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/ghost/usernameinfo/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/gone/usernameinfo/"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"message": "User not found", "status": "fail"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/broken/usernameinfo/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let c = mock_client(&server).await;
        assert_eq!(c.user_id_from_username("ghost").await.unwrap(), None);
        assert_eq!(c.user_id_from_username("gone").await.unwrap(), None);
        assert!(matches!(
            c.user_id_from_username("broken").await,
            Err(DomainError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_rejects_names_outside_charset_without_request() {
        let server = MockServer::start().await;
        let c = mock_client(&server).await;
        assert_eq!(
            c.user_id_from_username("../../accounts/current_user/?edit=true#")
                .await
                .unwrap(),
            None
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_send_parses_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/direct_v2/threads/broadcast/text/"))
            .and(header("authorization", "Bearer IGT:2:tok"))
            .and(body_string_contains("recipient_users=%5B%5B1234%5D%5D"))
            .and(body_string_contains("text=hello+there"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack_body()))
            .expect(1)
            .mount(&server)
            .await;

        let c = logged_in_client(&server).await;
        let receipt = c
            .direct_send("hello there", &[UserId::from("1234")])
            .await
            .unwrap();
        assert_eq!(
            receipt,
            Some(DirectReceipt {
                item_id: Some("3061".into()),
                thread_id: Some("3400".into()),
            })
        );
    }

    #[tokio::test]
    async fn test_direct_send_not_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/direct_v2/threads/broadcast/text/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "fail"})))
            .mount(&server)
            .await;

        let c = logged_in_client(&server).await;
        assert_eq!(c.direct_send("hi", &[UserId::from("1")]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_direct_send_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/direct_v2/threads/broadcast/text/"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Please wait a few minutes"))
            .mount(&server)
            .await;

        let c = logged_in_client(&server).await;
        let err = c.direct_send("hi", &[UserId::from("1")]).await.unwrap_err();
        assert!(matches!(err, DomainError::Gateway(m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_photo_is_uploaded_then_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/rupload_igphoto/\d+_0_\d+$"))
            .and(header("x-entity-type", "image/jpeg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"upload_id": "9988", "status": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/direct_v2/threads/broadcast/configure_photo/"))
            .and(body_string_contains("upload_id=9988"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ack_body()))
            .expect(1)
            .mount(&server)
            .await;

        let mut photo = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        photo.write_all(&[0xff, 0xd8, 0xff, 0xd9]).unwrap();

        let c = logged_in_client(&server).await;
        let receipt = c
            .direct_send_photo(photo.path(), &[UserId::from("1234")])
            .await
            .unwrap();
        assert_eq!(receipt.and_then(|r| r.item_id).as_deref(), Some("3061"));
    }
}
