//! Login flow with session reuse. Delegates to AuthPort and SessionStorePort.
//!
//! A persisted session is only an optimization: whatever happens while loading it,
//! the flow converges on a full login when no usable identity results.

use crate::domain::{Credentials, DomainError, UserId};
use crate::ports::{AuthPort, SessionLoad, SessionStorePort};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct AuthService {
    auth: Arc<dyn AuthPort>,
    store: Arc<dyn SessionStorePort>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthPort>, store: Arc<dyn SessionStorePort>) -> Self {
        Self { auth, store }
    }

    /// Authenticate `credentials`, reusing the stored session when it yields an identity.
    ///
    /// # Errors
    /// Returns `DomainError::Auth` when the full login fails. Store read problems never
    /// fail the flow; a failed write after a successful login is only logged.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserId, DomainError> {
        let username = credentials.username.as_str();
        let path = self.store.path_for(username);

        let mut restored = false;
        match self.store.load(username).await {
            SessionLoad::Missing => {
                info!(path = %path.display(), "no stored session");
            }
            SessionLoad::Unreadable(reason) => {
                warn!(path = %path.display(), reason = %reason, "stored session unreadable, ignoring it");
            }
            SessionLoad::Loaded(state) => {
                info!(path = %path.display(), "loading existing session");
                match self.auth.restore_session(state).await {
                    Ok(()) => restored = true,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "stored session rejected, ignoring it")
                    }
                }
            }
        }

        if let Some(user_id) = self.auth.current_user_id().await {
            info!(username, user_id = %user_id, "reusing stored session");
            return Ok(user_id);
        }

        if restored {
            info!(path = %path.display(), "session loaded but not authenticated");
        }
        info!(username, "logging in to Instagram");
        let user_id = self
            .auth
            .login(username, &credentials.password)
            .await
            .inspect_err(|e| error!(username, error = %e, "failed to login to Instagram"))?;

        let state = self.auth.export_session().await;
        match self.store.save(username, &state).await {
            Ok(()) => info!(path = %path.display(), "session saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not persist session"),
        }
        Ok(user_id)
    }
}
