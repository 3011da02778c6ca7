//! Emulated Android device identity and request signing helpers.
//!
//! The private API expects requests that look like they come from the official
//! Android app: stable device ids, a matching user agent, `signed_body` payloads.

use crate::domain::DeviceSettings;
use uuid::Uuid;

/// User agent of the emulated app build and device.
pub const DEFAULT_USER_AGENT: &str = "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";

/// Application id of the Android client.
pub const APP_ID: &str = "567067343352427";

/// Capability bitmap advertised by the emulated client.
pub const CAPABILITIES: &str = "3brTvx0=";

pub const LOCALE: &str = "en_US";

/// Fresh random device identity.
pub fn generate_device() -> DeviceSettings {
    let android_hex = Uuid::new_v4().simple().to_string();
    DeviceSettings {
        uuid: Uuid::new_v4().to_string(),
        phone_id: Uuid::new_v4().to_string(),
        client_session_id: Uuid::new_v4().to_string(),
        advertising_id: Uuid::new_v4().to_string(),
        android_device_id: format!("android-{}", &android_hex[..16]),
    }
}

/// Checksum field sent alongside login: "2" followed by the sum of the input's bytes.
pub fn jazoest(input: &str) -> String {
    let sum: u64 = input.bytes().map(u64::from).sum();
    format!("2{}", sum)
}

/// Wrap a JSON payload the way the app does for signed endpoints.
pub fn signed_body(payload: &serde_json::Value) -> String {
    format!("SIGNATURE.{}", payload)
}

/// Password envelope, version 0 (plain text within the TLS channel).
pub fn enc_password(password: &str, timestamp: i64) -> String {
    format!("#PWD_INSTAGRAM:0:{}:{}", timestamp, password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jazoest() {
        // 'a' = 97, 'b' = 98
        assert_eq!(jazoest("ab"), "2195");
        assert_eq!(jazoest(""), "20");
    }

    #[test]
    fn test_generate_device_shapes() {
        let d = generate_device();
        assert!(d.android_device_id.starts_with("android-"));
        assert_eq!(d.android_device_id.len(), "android-".len() + 16);
        assert_eq!(d.uuid.len(), 36);
        assert_ne!(d.uuid, d.phone_id);
    }

    #[test]
    fn test_signed_body_prefix() {
        let body = signed_body(&json!({"username": "alice"}));
        assert_eq!(body, r#"SIGNATURE.{"username":"alice"}"#);
    }

    #[test]
    fn test_enc_password() {
        assert_eq!(
            enc_password("hunter2", 1700000000),
            "#PWD_INSTAGRAM:0:1700000000:hunter2"
        );
    }
}
