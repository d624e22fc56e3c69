//! # Queue Inspector
//!
//! Read-only view of the queue plus the one destructive command.
//!
//! ```text
//!   list(limit) / list_page() / counts()      never mutate
//!
//!   prepare_clear() ──► ClearPrompt { total, pending }   shown to the operator
//!                            │ confirm()
//!                            ▼
//!                     ClearConfirmation ──► clear_all(token) ──► rows deleted
//! ```
//!
//! A [`ClearConfirmation`] can only be made through [`ClearPrompt::confirm`],
//! and `clear_all` consumes it, so every clear was preceded by a prompt.

use std::sync::Arc;
use tracing::{debug, info, warn};

use scanq_core::{QueueCounts, ScanRecord};
use scanq_db::Database;

use crate::config::QueueSettings;
use crate::emitter::ScanEventEmitter;
use crate::error::SyncResult;

/// What the operator is asked to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearPrompt {
    pub total: i64,
    /// Records that were never acknowledged and will be lost.
    pub pending: i64,
}

impl ClearPrompt {
    /// The operator said yes.
    pub fn confirm(self) -> ClearConfirmation {
        ClearConfirmation { _private: () }
    }

    pub fn message(&self) -> String {
        if self.pending > 0 {
            format!(
                "Delete all {} scans? {} have not been synced and will be lost.",
                self.total, self.pending
            )
        } else {
            format!("Delete all {} scans?", self.total)
        }
    }
}

/// Proof that the operator confirmed a clear.
#[derive(Debug)]
pub struct ClearConfirmation {
    _private: (),
}

/// Presentation access to the queue.
pub struct QueueInspector {
    db: Database,
    emitter: Arc<dyn ScanEventEmitter>,
    page_size: u32,
    max_page_size: u32,
}

impl QueueInspector {
    pub fn new(db: Database, emitter: Arc<dyn ScanEventEmitter>, paging: &QueueSettings) -> Self {
        QueueInspector {
            db,
            emitter,
            page_size: paging.page_size,
            max_page_size: paging.max_page_size,
        }
    }

    /// Most recent scans first. `limit` is clamped to `1..=max_page_size`.
    pub async fn list(&self, limit: u32) -> SyncResult<Vec<ScanRecord>> {
        let clamped = limit.clamp(1, self.max_page_size);
        if clamped != limit {
            debug!(requested = limit, limit = clamped, "List limit clamped");
        }
        Ok(self.db.scans().list_recent(clamped).await?)
    }

    /// One page of the configured size.
    pub async fn list_page(&self) -> SyncResult<Vec<ScanRecord>> {
        self.list(self.page_size).await
    }

    pub async fn counts(&self) -> SyncResult<QueueCounts> {
        Ok(self.db.scans().count_by_status().await?)
    }

    pub async fn prepare_clear(&self) -> SyncResult<ClearPrompt> {
        let counts = self.counts().await?;
        Ok(ClearPrompt {
            total: counts.total,
            pending: counts.pending,
        })
    }

    /// Deletes every record. Irreversible.
    pub async fn clear_all(&self, _confirmation: ClearConfirmation) -> SyncResult<u64> {
        let deleted = self.db.scans().clear_all().await?;

        if deleted > 0 {
            warn!(deleted, "Scan queue cleared by operator");
        } else {
            info!("Scan queue clear requested on an empty queue");
        }

        self.emitter.emit_counts(&QueueCounts::default());
        Ok(deleted)
    }
}
