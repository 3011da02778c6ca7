//! Implements AuthPort on the shared InstagramClient.
//!
//! Login, session restore and export all act on the same state the gateway uses,
//! so a restored or fresh login is immediately visible to tool calls.

use crate::adapters::instagram::client::InstagramClient;
use crate::adapters::instagram::{device, mapper};
use crate::domain::{DomainError, SessionState, UserId};
use crate::ports::AuthPort;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

#[async_trait]
impl AuthPort for InstagramClient {
    async fn restore_session(&self, state: SessionState) -> Result<(), DomainError> {
        let mut current = self.state.write().await;
        if !state.username.is_empty() && state.username != current.username {
            return Err(DomainError::Session(format!(
                "session record belongs to '{}', expected '{}'",
                state.username, current.username
            )));
        }
        debug!(
            username = %state.username,
            authenticated = state.is_authenticated(),
            "session state restored"
        );
        *current = SessionState {
            username: current.username.clone(),
            ..state
        };
        Ok(())
    }

    async fn current_user_id(&self) -> Option<UserId> {
        self.state.read().await.user_id()
    }

    async fn login(&self, username: &str, password: &str) -> Result<UserId, DomainError> {
        let (phone_id, payload) = {
            let mut state = self.state.write().await;
            // A stale restored identity must not survive a fresh login attempt.
            state.authorization = None;
            state.ds_user_id = None;
            let d = &state.device;
            let payload = json!({
                "jazoest": device::jazoest(&d.phone_id),
                "country_codes": r#"[{"country_code":"1","source":["default"]}]"#,
                "phone_id": d.phone_id,
                "enc_password": device::enc_password(password, Utc::now().timestamp()),
                "username": username,
                "adid": d.advertising_id,
                "guid": d.uuid,
                "device_id": d.android_device_id,
                "google_tokens": "[]",
                "login_attempt_count": "0",
            });
            (d.phone_id.clone(), payload)
        };
        debug!(username, phone_id = %phone_id, "posting login");

        let req = self
            .http_post("api/v1/accounts/login/")
            .form(&[("signed_body", device::signed_body(&payload))]);
        let (status, body) = self
            .execute(req)
            .await
            .map_err(|e| DomainError::Auth(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(match mapper::api_error(status, &body) {
                e @ DomainError::Auth(_) => e,
                other => DomainError::Auth(other.to_string()),
            });
        }

        let resp: mapper::LoginResponse = serde_json::from_str(&body)
            .map_err(|e| DomainError::Auth(format!("parse login response: {}", e)))?;
        let user = resp
            .logged_in_user
            .ok_or_else(|| DomainError::Auth("login response has no logged_in_user".into()))?;
        let user_id = mapper::user_id_from_pk(&user.pk)
            .ok_or_else(|| DomainError::Auth("login response has no user pk".into()))?;

        let mut state = self.state.write().await;
        if state.authorization.is_none() {
            return Err(DomainError::Auth(
                "login response carried no authorization header".into(),
            ));
        }
        state.ds_user_id = Some(user_id.0.clone());
        state.username = username.to_string();
        state.last_login = Some(Utc::now());
        info!(username, user_id = %user_id, "logged in");
        Ok(user_id)
    }

    async fn export_session(&self) -> SessionState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::instagram::client::ClientOptions;
    use crate::domain::DeviceSettings;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stored(username: &str) -> SessionState {
        SessionState {
            username: username.into(),
            device: DeviceSettings {
                uuid: "11111111-1111-1111-1111-111111111111".into(),
                phone_id: "22222222-2222-2222-2222-222222222222".into(),
                client_session_id: "33333333-3333-3333-3333-333333333333".into(),
                advertising_id: "44444444-4444-4444-4444-444444444444".into(),
                android_device_id: "android-0123456789abcdef".into(),
            },
            user_agent: "ua".into(),
            authorization: Some("Bearer IGT:2:abc".into()),
            ds_user_id: Some("42".into()),
            mid: None,
            last_login: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_client_is_not_authenticated() {
        let c = InstagramClient::new("alice", ClientOptions::default()).unwrap();
        assert_eq!(c.current_user_id().await, None);
    }

    #[tokio::test]
    async fn test_restore_adopts_identity_and_device() {
        let c = InstagramClient::new("alice", ClientOptions::default()).unwrap();
        c.restore_session(stored("alice")).await.unwrap();
        assert_eq!(c.current_user_id().await, Some(UserId::from("42")));
        let exported = c.export_session().await;
        assert_eq!(exported.device.android_device_id, "android-0123456789abcdef");
    }

    #[tokio::test]
    async fn test_restore_rejects_foreign_record() {
        let c = InstagramClient::new("alice", ClientOptions::default()).unwrap();
        let err = c.restore_session(stored("bob")).await.unwrap_err();
        assert!(matches!(err, DomainError::Session(_)));
        assert_eq!(c.current_user_id().await, None);
    }

    fn mock_client(server: &MockServer) -> InstagramClient {
        InstagramClient::new(
            "alice",
            ClientOptions {
                base_url: server.uri(),
                ..ClientOptions::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_signs_body_and_absorbs_session_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/accounts/login/"))
            .and(body_string_contains("signed_body=SIGNATURE."))
            .and(body_string_contains("%23PWD_INSTAGRAM%3A0%3A"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ig-set-authorization", "Bearer IGT:2:eyJ0b2tlbiI6MX0=")
                    .insert_header("ig-set-ig-u-ds-user-id", "1234")
                    .insert_header("ig-set-x-mid", "mid-1")
                    .set_body_json(json!({
                        "logged_in_user": {"pk": 1234, "username": "alice"},
                        "status": "ok"
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let c = mock_client(&server);
        assert_eq!(c.login("alice", "hunter2").await.unwrap(), UserId::from("1234"));

        let exported = c.export_session().await;
        assert_eq!(
            exported.authorization.as_deref(),
            Some("Bearer IGT:2:eyJ0b2tlbiI6MX0=")
        );
        assert_eq!(exported.ds_user_id.as_deref(), Some("1234"));
        assert_eq!(exported.mid.as_deref(), Some("mid-1"));
        assert!(exported.last_login.is_some());
    }

    #[tokio::test]
    async fn test_login_bad_password_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/accounts/login/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "The password you entered is incorrect.",
                "error_type": "bad_password",
                "status": "fail"
            })))
            .mount(&server)
            .await;

        let err = mock_client(&server)
            .login("alice", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Auth(m) if m.starts_with("bad password")));
    }

    #[tokio::test]
    async fn test_login_without_authorization_header_drops_stale_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/accounts/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "logged_in_user": {"pk": 1234},
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let c = mock_client(&server);
        c.restore_session(stored("alice")).await.unwrap();
        let err = c.login("alice", "hunter2").await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(m) if m.contains("authorization")));
        assert_eq!(c.current_user_id().await, None);
    }
}
