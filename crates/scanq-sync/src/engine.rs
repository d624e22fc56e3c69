//! # Sync Engine
//!
//! Sends every pending scan to the endpoint as one batch and writes the
//! per-record outcomes back.
//!
//! ## One Sync Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine::sync()                             │
//! │                                                                         │
//! │  offline? ─────────────────────────────► Offline       {0, 0, "offline"}│
//! │  no endpoint? ─────────────────────────► NotConfigured                  │
//! │  claim in-flight guard ── taken ───────► AlreadyRunning {0, 0}          │
//! │       │ (released on EVERY exit path, incl. timeout and cancellation)   │
//! │       ▼                                                                 │
//! │  list_pending() ── error ──────────────► StorageFailed                  │
//! │       │ empty ─────────────────────────► NothingPending {0, 0}          │
//! │       ▼                                                                 │
//! │  timeout(request_timeout, send_batch)                                   │
//! │       │ no answer / non-2xx / garbage ─► TransportFailed (no mutation)  │
//! │       ▼                                                                 │
//! │  map_outcomes → apply_batch_outcomes (one transaction)                  │
//! │       │   sync_attempts += 1, synced / last_error per record            │
//! │       ▼                                                                 │
//! │  Completed {synced, failed}                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no retry loop. A failed run waits for the next trigger: a new
//! scan, an online transition, or the operator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scanq_db::Database;

use crate::connectivity::Connectivity;
use crate::emitter::ScanEventEmitter;
use crate::error::SyncError;
use crate::protocol::{map_outcomes, BatchRequest};
use crate::transport::BatchTransport;

/// Error text for a run attempted while offline.
pub const OFFLINE_ERROR: &str = "offline";

// =============================================================================
// Sync Report
// =============================================================================

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    /// The batch was answered and outcomes applied.
    Completed,
    /// Nothing was pending.
    NothingPending,
    /// The device is offline; nothing was read or mutated.
    Offline,
    /// Another run is in flight; this call was a no-op.
    AlreadyRunning,
    /// No usable answer from the endpoint; every record stays pending.
    TransportFailed,
    /// The local store failed while reading or applying.
    StorageFailed,
    /// No endpoint configured.
    NotConfigured,
}

/// Result of one `sync()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: SyncRunStatus,
    /// Records acknowledged by the endpoint in this run.
    pub synced: u64,
    /// Records answered with a failure in this run.
    pub failed: u64,
    pub error: Option<String>,
}

impl SyncReport {
    fn empty(status: SyncRunStatus) -> Self {
        SyncReport {
            status,
            synced: 0,
            failed: 0,
            error: None,
        }
    }

    fn failed_with(status: SyncRunStatus, error: impl Into<String>) -> Self {
        SyncReport {
            error: Some(error.into()),
            ..Self::empty(status)
        }
    }

    /// True for the runs that mean "the endpoint and the store are fine".
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            SyncRunStatus::Completed | SyncRunStatus::NothingPending
        )
    }
}

/// Engine state exposed to the session status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub in_flight: bool,
    /// End of the last run that reached the endpoint (or found nothing to do).
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Error of the last run that had one; cleared by a successful run.
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
}

// =============================================================================
// In-Flight Guard
// =============================================================================

/// Holds the in-flight flag for the duration of one run.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    released: &'a Notify,
}

impl<'a> InFlightGuard<'a> {
    fn try_claim(flag: &'a AtomicBool, released: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag, released })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.released.notify_waiters();
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Batch sync with an at-most-one-run guarantee.
pub struct SyncEngine {
    db: Database,
    transport: Option<Arc<dyn BatchTransport>>,
    connectivity: Connectivity,
    emitter: Arc<dyn ScanEventEmitter>,
    device_id: String,
    request_timeout: Duration,
    in_flight: AtomicBool,
    released: Notify,
    status: RwLock<EngineStatus>,
}

impl SyncEngine {
    pub fn new(
        db: Database,
        transport: Option<Arc<dyn BatchTransport>>,
        connectivity: Connectivity,
        emitter: Arc<dyn ScanEventEmitter>,
        device_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        SyncEngine {
            db,
            transport,
            connectivity,
            emitter,
            device_id: device_id.into(),
            request_timeout,
            in_flight: AtomicBool::new(false),
            released: Notify::new(),
            status: RwLock::new(EngineStatus::default()),
        }
    }

    /// True while a run holds the guard.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no run holds the guard.
    pub async fn wait_until_idle(&self) {
        loop {
            let released = self.released.notified();
            if !self.is_in_flight() {
                return;
            }
            released.await;
        }
    }

    /// Snapshot of the engine state.
    pub async fn status(&self) -> EngineStatus {
        let mut status = self.status.read().await.clone();
        status.in_flight = self.is_in_flight();
        status
    }

    /// Runs one sync. Never fails: every outcome is described by the report.
    pub async fn sync(&self) -> SyncReport {
        if !self.connectivity.is_online() {
            debug!("Sync requested while offline");
            return self
                .finish(SyncReport::failed_with(SyncRunStatus::Offline, OFFLINE_ERROR))
                .await;
        }

        let Some(transport) = self.transport.clone() else {
            return self
                .finish(SyncReport::failed_with(
                    SyncRunStatus::NotConfigured,
                    SyncError::NotConfigured.to_string(),
                ))
                .await;
        };

        let Some(_guard) = InFlightGuard::try_claim(&self.in_flight, &self.released) else {
            debug!("Sync already in flight, ignoring request");
            let report = SyncReport::empty(SyncRunStatus::AlreadyRunning);
            self.emitter.emit_sync_report(&report);
            return report;
        };

        let report = self.run(transport.as_ref()).await;
        self.finish(report).await
    }

    /// Starts a detached run and returns immediately.
    ///
    /// Used on teardown. There is no delivery guarantee: if the process dies
    /// before the endpoint answers, the batch is simply still pending next
    /// time.
    pub fn flush_best_effort(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let report = engine.sync().await;
            debug!(status = ?report.status, "Best-effort flush finished");
        })
    }

    async fn run(&self, transport: &dyn BatchTransport) -> SyncReport {
        let scans = self.db.scans();

        let pending = match scans.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Failed to read pending scans");
                return SyncReport::failed_with(SyncRunStatus::StorageFailed, e.to_string());
            }
        };

        if pending.is_empty() {
            debug!("No pending scans");
            return SyncReport::empty(SyncRunStatus::NothingPending);
        }

        let request = BatchRequest::from_records(&self.device_id, &pending);
        info!(
            batch_id = %request.batch_id,
            items = request.len(),
            endpoint = %transport.endpoint(),
            "Transmitting scan batch"
        );

        let sent = tokio::time::timeout(self.request_timeout, transport.send_batch(&request)).await;
        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, batch_id = %request.batch_id, "Batch transmission failed");
                return SyncReport::failed_with(SyncRunStatus::TransportFailed, e.to_string());
            }
            Err(_) => {
                let e = SyncError::Timeout(self.request_timeout.as_millis() as u64);
                warn!(error = %e, batch_id = %request.batch_id, "Batch transmission timed out");
                return SyncReport::failed_with(SyncRunStatus::TransportFailed, e.to_string());
            }
        };

        let outcomes = map_outcomes(&pending, &response);

        match scans.apply_batch_outcomes(&outcomes).await {
            Ok(applied) => {
                info!(
                    batch_id = %request.batch_id,
                    synced = applied.accepted,
                    failed = applied.rejected,
                    cleared_meanwhile = applied.missing,
                    "Sync run complete"
                );
                SyncReport {
                    status: SyncRunStatus::Completed,
                    synced: applied.accepted,
                    failed: applied.rejected,
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, batch_id = %request.batch_id, "Failed to apply batch outcomes");
                SyncReport::failed_with(SyncRunStatus::StorageFailed, e.to_string())
            }
        }
    }

    /// Records the report in the engine status and notifies the emitter.
    async fn finish(&self, report: SyncReport) -> SyncReport {
        {
            let mut status = self.status.write().await;
            if report.is_success() {
                status.last_sync_at = Some(Utc::now());
                status.last_error = None;
            } else if let Some(ref error) = report.error {
                status.last_error = Some(error.clone());
            }
            status.last_report = Some(report.clone());
        }

        self.emitter.emit_sync_report(&report);

        if report.status == SyncRunStatus::Completed {
            match self.db.scans().count_by_status().await {
                Ok(counts) => self.emitter.emit_counts(&counts),
                Err(e) => warn!(error = %e, "Failed to refresh counts after sync"),
            }
        }

        report
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OUTCOME_MISSING;
    use crate::testing::{
        engine_with, seed, test_db, GatedTransport, HangingTransport, ScriptedTransport,
    };
    use pretty_assertions::assert_eq;
    use scanq_core::QueueCounts;

    #[tokio::test]
    async fn test_offline_sync_touches_nothing() {
        let db = test_db().await;
        seed(&db, &["A1", "A2", "A3"]).await;
        let transport = Arc::new(ScriptedTransport::accept_all());
        let engine = engine_with(&db, &Connectivity::new(false), Some(transport.clone()));

        let report = engine.sync().await;
        assert_eq!(
            report,
            SyncReport {
                status: SyncRunStatus::Offline,
                synced: 0,
                failed: 0,
                error: Some("offline".into()),
            }
        );
        assert_eq!(transport.calls(), 0);
        assert_eq!(db.scans().count_pending().await.unwrap(), 3);
        let attempts: Vec<_> = db
            .scans()
            .list_pending()
            .await
            .unwrap()
            .iter()
            .map(|r| r.sync_attempts)
            .collect();
        assert_eq!(attempts, vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn test_all_accepted() {
        let db = test_db().await;
        seed(&db, &["012345678905", "96385074"]).await;
        let engine = engine_with(
            &db,
            &Connectivity::new(true),
            Some(Arc::new(ScriptedTransport::accept_all())),
        );

        let report = engine.sync().await;
        assert_eq!(report.status, SyncRunStatus::Completed);
        assert_eq!((report.synced, report.failed), (2, 0));
        assert_eq!(
            db.scans().count_by_status().await.unwrap(),
            QueueCounts {
                total: 2,
                pending: 0,
                synced: 2
            }
        );

        let status = engine.status().await;
        assert!(status.last_sync_at.is_some());
        assert_eq!(status.last_error, None);
        assert!(!status.in_flight);
    }

    #[tokio::test]
    async fn test_partial_batch() {
        let db = test_db().await;
        let records = seed(&db, &["GOOD-1", "BAD-1"]).await;
        let engine = engine_with(
            &db,
            &Connectivity::new(true),
            Some(Arc::new(ScriptedTransport::reject(&["BAD-1"], "malformed barcode"))),
        );

        let report = engine.sync().await;
        assert_eq!((report.synced, report.failed), (1, 1));

        let rejected = db.scans().get(&records[1].id).await.unwrap().unwrap();
        assert!(!rejected.synced);
        assert_eq!(rejected.last_error.as_deref(), Some("malformed barcode"));
        assert_eq!(rejected.sync_attempts, 1);

        let accepted = db.scans().get(&records[0].id).await.unwrap().unwrap();
        assert!(accepted.synced);
        assert_eq!(accepted.last_error, None);
    }

    #[tokio::test]
    async fn test_missing_outcomes_stay_pending() {
        let db = test_db().await;
        seed(&db, &["A1", "A2"]).await;
        let engine = engine_with(
            &db,
            &Connectivity::new(true),
            Some(Arc::new(ScriptedTransport::answer_first(1))),
        );

        let report = engine.sync().await;
        assert_eq!((report.synced, report.failed), (1, 1));
        let pending = db.scans().list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_error.as_deref(), Some(OUTCOME_MISSING));
    }

    #[tokio::test]
    async fn test_synced_records_never_resent() {
        let db = test_db().await;
        seed(&db, &["A1", "A2"]).await;
        let transport = Arc::new(ScriptedTransport::reject(&["A2"], "unknown sku"));
        let engine = engine_with(&db, &Connectivity::new(true), Some(transport.clone()));

        engine.sync().await;
        seed(&db, &["A3"]).await;
        engine.sync().await;

        let batches = transport.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], vec!["A1", "A2"]);
        assert_eq!(batches[1], vec!["A2", "A3"]);
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let db = test_db().await;
        let transport = Arc::new(ScriptedTransport::accept_all());
        let engine = engine_with(&db, &Connectivity::new(true), Some(transport.clone()));

        let report = engine.sync().await;
        assert_eq!(report, SyncReport::empty(SyncRunStatus::NothingPending));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let db = test_db().await;
        seed(&db, &["A1"]).await;
        let engine = engine_with(&db, &Connectivity::new(true), None);

        let report = engine.sync().await;
        assert_eq!(report.status, SyncRunStatus::NotConfigured);
        assert_eq!(db.scans().count_pending().await.unwrap(), 1);
        assert!(engine.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_mutates_nothing() {
        let db = test_db().await;
        let records = seed(&db, &["A1", "A2"]).await;
        let engine = engine_with(
            &db,
            &Connectivity::new(true),
            Some(Arc::new(ScriptedTransport::failing())),
        );

        let report = engine.sync().await;
        assert_eq!(report.status, SyncRunStatus::TransportFailed);
        assert!(report.error.is_some());

        for record in &records {
            let stored = db.scans().get(&record.id).await.unwrap().unwrap();
            assert!(!stored.synced);
            assert_eq!(stored.sync_attempts, 0);
            assert_eq!(stored.last_error, None);
        }
        assert!(!engine.is_in_flight());
    }

    #[tokio::test]
    async fn test_at_most_one_run() {
        let db = test_db().await;
        seed(&db, &["A1", "A2"]).await;
        let transport = Arc::new(GatedTransport::new());
        let engine = engine_with(&db, &Connectivity::new(true), Some(transport.clone()));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync().await }
        });
        transport.wait_until_entered().await;
        assert!(engine.is_in_flight());

        let second = engine.sync().await;
        assert_eq!(second, SyncReport::empty(SyncRunStatus::AlreadyRunning));

        transport.release();
        let first = first.await.unwrap();
        assert_eq!(first.synced, 2);
        assert_eq!(transport.calls(), 1);
        assert!(!engine.is_in_flight());
    }

    #[tokio::test]
    async fn test_wait_until_idle_follows_the_run() {
        let db = test_db().await;
        seed(&db, &["A1"]).await;
        let transport = Arc::new(GatedTransport::new());
        let engine = engine_with(&db, &Connectivity::new(true), Some(transport.clone()));

        // Idle engine resolves at once
        engine.wait_until_idle().await;

        let run = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync().await }
        });
        transport.wait_until_entered().await;

        let waiter = tokio::spawn({
            let engine = engine.clone();
            async move { engine.wait_until_idle().await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        transport.release();
        waiter.await.unwrap();
        assert!(!engine.is_in_flight());
        assert_eq!(run.await.unwrap().status, SyncRunStatus::Completed);
    }

    #[tokio::test]
    async fn test_timeout_clears_guard() {
        let db = test_db().await;
        seed(&db, &["A1"]).await;
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            Some(Arc::new(HangingTransport)),
            Connectivity::new(true),
            Arc::new(crate::emitter::NoOpEmitter),
            "dock-test",
            Duration::from_millis(100),
        ));

        let report = engine.sync().await;
        assert_eq!(report.status, SyncRunStatus::TransportFailed);
        assert!(report.error.unwrap().contains("timed out"));
        assert!(!engine.is_in_flight());

        let stored = db.scans().list_pending().await.unwrap();
        assert_eq!(stored[0].sync_attempts, 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_releases_guard() {
        let db = test_db().await;
        seed(&db, &["A1"]).await;
        let transport = Arc::new(GatedTransport::new());
        let engine = engine_with(&db, &Connectivity::new(true), Some(transport.clone()));

        let run = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync().await }
        });
        transport.wait_until_entered().await;
        run.abort();
        let _ = run.await;

        assert!(!engine.is_in_flight());
        assert_eq!(db.scans().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flush_best_effort() {
        let db = test_db().await;
        seed(&db, &["A1"]).await;
        let engine = engine_with(
            &db,
            &Connectivity::new(true),
            Some(Arc::new(ScriptedTransport::accept_all())),
        );

        engine.flush_best_effort().await.unwrap();
        assert_eq!(db.scans().count_pending().await.unwrap(), 0);
    }
}
