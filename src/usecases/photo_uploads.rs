//! Background photo uploads. Each upload is a spawned task with an abort handle and a
//! status slot the host can poll through the `photo_upload_status` tool.
//!
//! Terminal states (sent / failed / cancelled) are logged separately from "initiated".
//! Cancelling aborts the task at its next await point. An upload whose send already
//! returned records its real outcome, which replaces a `cancelled` status set meanwhile;
//! `cancelled` therefore means the send was cut off, though a request already in flight
//! may still have reached Instagram.

use crate::domain::{UploadStatus, UserId};
use crate::ports::InstagramGateway;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default number of finished uploads kept for status queries.
pub const DEFAULT_UPLOAD_RETENTION: usize = 100;

struct UploadEntry {
    recipient: String,
    status: UploadStatus,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, UploadEntry>,
    /// Finished upload ids, oldest first.
    finished: VecDeque<String>,
}

impl Registry {
    /// Record a terminal state unless the entry already has one.
    fn finish(&mut self, id: &str, status: UploadStatus, retention: usize) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = status;
        entry.abort = None;
        self.finished.push_back(id.to_string());
        while self.finished.len() > retention {
            if let Some(old) = self.finished.pop_front() {
                self.entries.remove(&old);
            }
        }
        true
    }

    /// Record the outcome reported by the upload task itself. Overrides `Cancelled`,
    /// which only means an abort was requested.
    fn settle(&mut self, id: &str, status: UploadStatus, retention: usize) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.status == UploadStatus::Cancelled => {
                entry.status = status;
                true
            }
            Some(_) => self.finish(id, status, retention),
            None => false,
        }
    }
}

/// Snapshot of one upload for callers.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSnapshot {
    pub upload_id: String,
    pub recipient: String,
    pub status: UploadStatus,
}

/// Tracks background uploads. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct PhotoUploadTracker {
    registry: Arc<Mutex<Registry>>,
    retention: usize,
}

impl Default for PhotoUploadTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_RETENTION)
    }
}

impl PhotoUploadTracker {
    pub fn new(retention: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            retention: retention.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start uploading `path` to `user_id` in the background. Returns the upload id.
    pub fn spawn(
        &self,
        gateway: Arc<dyn InstagramGateway>,
        recipient: &str,
        user_id: UserId,
        path: PathBuf,
    ) -> String {
        let upload_id = Uuid::new_v4().to_string();
        // Hold the lock across spawn so the task cannot finish before its entry exists.
        let mut registry = self.registry();
        registry.entries.insert(
            upload_id.clone(),
            UploadEntry {
                recipient: recipient.to_string(),
                status: UploadStatus::Pending,
                abort: None,
            },
        );

        let tracker = self.clone();
        let id = upload_id.clone();
        let recipient_name = recipient.to_string();
        let handle = tokio::spawn(async move {
            let outcome = gateway.direct_send_photo(&path, &[user_id]).await;
            let status = match outcome {
                Ok(Some(receipt)) => {
                    info!(
                        upload_id = %id,
                        recipient = %recipient_name,
                        direct_message_id = ?receipt.item_id,
                        "background photo sent"
                    );
                    UploadStatus::Sent {
                        direct_message_id: receipt.item_id,
                        thread_id: receipt.thread_id,
                    }
                }
                Ok(None) => {
                    warn!(upload_id = %id, recipient = %recipient_name, "background photo not acknowledged");
                    UploadStatus::Failed {
                        error: "Failed to send photo.".to_string(),
                    }
                }
                Err(e) => {
                    error!(upload_id = %id, recipient = %recipient_name, error = %e, "background photo failed");
                    UploadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            tracker.complete(&id, status);
        });

        if let Some(entry) = registry.entries.get_mut(&upload_id) {
            entry.abort = Some(handle.abort_handle());
        }
        info!(upload_id = %upload_id, recipient, "background photo upload initiated");
        upload_id
    }

    fn complete(&self, upload_id: &str, status: UploadStatus) {
        let mut registry = self.registry();
        let was_cancelled = registry
            .entries
            .get(upload_id)
            .is_some_and(|e| e.status == UploadStatus::Cancelled);
        if registry.settle(upload_id, status, self.retention) && was_cancelled {
            warn!(upload_id, "upload finished before the cancellation took effect");
        }
    }

    pub fn status(&self, upload_id: &str) -> Option<UploadSnapshot> {
        let registry = self.registry();
        registry.entries.get(upload_id).map(|e| UploadSnapshot {
            upload_id: upload_id.to_string(),
            recipient: e.recipient.clone(),
            status: e.status.clone(),
        })
    }

    /// Abort a pending upload. Returns the resulting snapshot, or `None` for an unknown id.
    /// Already-finished uploads are returned unchanged.
    pub fn cancel(&self, upload_id: &str) -> Option<UploadSnapshot> {
        let mut registry = self.registry();
        let abort = registry.entries.get_mut(upload_id)?.abort.take();
        if let Some(abort) = abort {
            abort.abort();
            if registry.finish(upload_id, UploadStatus::Cancelled, self.retention) {
                info!(upload_id, "background photo upload cancelled");
            }
        }
        let entry = registry.entries.get(upload_id)?;
        Some(UploadSnapshot {
            upload_id: upload_id.to_string(),
            recipient: entry.recipient.clone(),
            status: entry.status.clone(),
        })
    }

    pub fn pending_count(&self) -> usize {
        let registry = self.registry();
        registry
            .entries
            .values()
            .filter(|e| !e.status.is_terminal())
            .count()
    }
}
