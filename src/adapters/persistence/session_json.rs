//! Implements SessionStorePort using one JSON file per username.
//!
//! Records live at `{dir}/.{username}_session.json`.

use crate::domain::{DomainError, SessionState};
use crate::ports::{SessionLoad, SessionStorePort};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// JSON file-based session storage.
pub struct SessionJson {
    dir: PathBuf,
}

impl SessionJson {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_name(username: &str) -> String {
        let safe: String = username
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        format!(".{}_session.json", safe)
    }
}

#[async_trait::async_trait]
impl SessionStorePort for SessionJson {
    fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(Self::file_name(username))
    }

    async fn load(&self, username: &str) -> SessionLoad {
        let path = self.path_for(username);
        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SessionLoad::Missing,
            Err(e) => return SessionLoad::Unreadable(format!("read {}: {}", path.display(), e)),
        };
        match serde_json::from_str::<SessionState>(&raw) {
            Ok(state) => SessionLoad::Loaded(state),
            Err(e) => SessionLoad::Unreadable(format!("parse {}: {}", path.display(), e)),
        }
    }

    /// Atomic save: write temp file, sync_all, rename over the target.
    async fn save(&self, username: &str, state: &SessionState) -> Result<(), DomainError> {
        let path = self.path_for(username);
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::Session(format!("create session directory: {}", e)))?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| DomainError::Session(e.to_string()))?;

        let temp_path = path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Session(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Session(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Session(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| DomainError::Session(format!("atomic rename failed: {}", e)))?;

        debug!(path = %path.display(), "session record written");
        Ok(())
    }
}
