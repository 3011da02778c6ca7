//! Application configuration and credential resolution.
//!
//! Runtime options come from `INSTA_MCP_*` environment variables (and an optional file
//! named by `INSTA_MCP_CONFIG`). Credentials are resolved separately: CLI first, then
//! `INSTAGRAM_USERNAME` / `INSTAGRAM_PASSWORD`.

use crate::adapters::instagram::client::{
    ClientOptions, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::domain::{Credentials, DomainError, PhotoMode};
use crate::usecases::photo_uploads::DEFAULT_UPLOAD_RETENTION;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const USERNAME_ENV: &str = "INSTAGRAM_USERNAME";
pub const PASSWORD_ENV: &str = "INSTAGRAM_PASSWORD";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Directory holding `.{username}_session.json` records. Read from INSTA_MCP_SESSION_DIR.
    #[serde(default)]
    pub session_dir: Option<String>,

    /// `background` (default) or `sync`. Read from INSTA_MCP_PHOTO_MODE.
    #[serde(default)]
    pub photo_mode: Option<String>,

    /// Private API host. Read from INSTA_MCP_API_BASE_URL.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Overrides the emulated app user agent. Read from INSTA_MCP_USER_AGENT.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Per-request HTTP timeout. Read from INSTA_MCP_REQUEST_TIMEOUT_SECS.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Proxy URL for all API traffic. Read from INSTA_MCP_PROXY.
    #[serde(default)]
    pub proxy: Option<String>,

    /// When set, logs are also written to a daily rolling file here. Read from INSTA_MCP_LOG_DIR.
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Finished background uploads kept for status queries. Read from INSTA_MCP_UPLOAD_RETENTION.
    #[serde(default)]
    pub upload_retention: Option<usize>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("INSTA_MCP_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix("INSTA_MCP").try_parsing(true));
        c.build()?.try_deserialize()
    }

    /// Session directory; CLI value wins over config. Defaults to the working directory.
    pub fn session_dir_or_default(&self, cli_override: Option<&str>) -> PathBuf {
        cli_override
            .or(self.session_dir.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns the photo mode. Defaults to background if unset.
    pub fn photo_mode(&self) -> Result<PhotoMode, DomainError> {
        match self.photo_mode.as_deref() {
            None => Ok(PhotoMode::default()),
            Some(s) => s.parse::<PhotoMode>().map_err(DomainError::Config),
        }
    }

    /// Returns the request timeout. Defaults to 30 seconds.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn upload_retention_or_default(&self) -> usize {
        self.upload_retention.unwrap_or(DEFAULT_UPLOAD_RETENTION)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            user_agent: self.user_agent.clone(),
            timeout: self.request_timeout(),
            proxy: self.proxy.clone().filter(|p| !p.trim().is_empty()),
        }
    }
}

/// Merge CLI and environment credentials. CLI takes precedence; empty values count as missing.
///
/// # Errors
/// `DomainError::Config` naming every missing field.
pub fn resolve_credentials(
    cli_username: Option<String>,
    cli_password: Option<String>,
    env_username: Option<String>,
    env_password: Option<String>,
) -> Result<Credentials, DomainError> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let username = present(cli_username).or_else(|| present(env_username));
    let password = present(cli_password).or_else(|| present(env_password));

    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials {
            username: username.trim().to_string(),
            password,
        }),
        (username, password) => {
            let mut missing = Vec::new();
            if username.is_none() {
                missing.push(format!("username (--username or {})", USERNAME_ENV));
            }
            if password.is_none() {
                missing.push(format!("password (--password or {})", PASSWORD_ENV));
            }
            Err(DomainError::Config(format!(
                "Instagram credentials are required; missing {}",
                missing.join(" and ")
            )))
        }
    }
}

/// Resolve credentials from CLI values and the process environment.
pub fn credentials_from_env(
    cli_username: Option<String>,
    cli_password: Option<String>,
) -> Result<Credentials, DomainError> {
    resolve_credentials(
        cli_username,
        cli_password,
        std::env::var(USERNAME_ENV).ok(),
        std::env::var(PASSWORD_ENV).ok(),
    )
}
