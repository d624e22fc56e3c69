//! # Scan Intake
//!
//! Turns decode events and manual entries into durable queue records.
//!
//! ## Camera Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  on_decode(code, format)                                                │
//! │     │                                                                   │
//! │     ├─ same code as last acceptance, inside window ──► Duplicate        │
//! │     │                                                   (silent)        │
//! │     ├─ validate (empty / too long / control chars) ──► InvalidBarcode   │
//! │     ├─ classify + insert ── store refuses ───────────► IntakeRejected   │
//! │     │       │                                                           │
//! │     │       ▼ durable                                                   │
//! │     ├─ record acceptance in the debouncer                               │
//! │     ├─ last_scan + ack                                                  │
//! │     └─ online? schedule ONE delayed sync (later scans join it)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Manual entry starts at "validate" and never touches the debouncer.
//!
//! The debouncer lock is held across the insert, so two reads of the same
//! code racing each other still produce one record.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use scanq_core::validation::validate_barcode_with_limit;
use scanq_core::{DebounceDecision, Debouncer, DecodeEvent, LastScan, ScanRecord, ScanSource};
use scanq_db::Database;

use crate::config::ScanqConfig;
use crate::connectivity::Connectivity;
use crate::emitter::ScanEventEmitter;
use crate::engine::{SyncEngine, SyncRunStatus};
use crate::error::{SyncError, SyncResult};
use crate::subscription::Subscription;

/// Format reported for typed entries.
pub const MANUAL_FORMAT: &str = "manual";

/// What happened to one decode event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Stored as a new pending record.
    Queued(ScanRecord),
    /// Repeat read inside the de-duplication window; discarded.
    Duplicate,
}

impl IntakeOutcome {
    pub fn record(&self) -> Option<&ScanRecord> {
        match self {
            IntakeOutcome::Queued(record) => Some(record),
            IntakeOutcome::Duplicate => None,
        }
    }
}

/// The only component that creates records.
pub struct ScanIntake {
    db: Database,
    engine: Arc<SyncEngine>,
    connectivity: Connectivity,
    emitter: Arc<dyn ScanEventEmitter>,
    max_barcode_len: usize,
    batch_delay: Duration,
    debouncer: Mutex<Debouncer>,
    last_scan: RwLock<Option<LastScan>>,
    sync_scheduled: Arc<AtomicBool>,
}

impl ScanIntake {
    pub fn new(
        db: Database,
        engine: Arc<SyncEngine>,
        connectivity: Connectivity,
        emitter: Arc<dyn ScanEventEmitter>,
        config: &ScanqConfig,
    ) -> Self {
        ScanIntake {
            db,
            engine,
            connectivity,
            emitter,
            max_barcode_len: config.intake.max_barcode_len,
            batch_delay: config.batch_delay(),
            debouncer: Mutex::new(Debouncer::new(config.dedup_window())),
            last_scan: RwLock::new(None),
            sync_scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handles one camera decode.
    pub async fn on_decode(&self, code: &str, format: &str) -> SyncResult<IntakeOutcome> {
        self.on_decode_at(code, format, Instant::now()).await
    }

    pub(crate) async fn on_decode_at(
        &self,
        code: &str,
        format: &str,
        now: Instant,
    ) -> SyncResult<IntakeOutcome> {
        let code = code.trim();
        let mut debouncer = self.debouncer.lock().await;

        if let DebounceDecision::Duplicate { since } = debouncer.check(code, now) {
            debug!(
                barcode = %code,
                since_ms = since.as_millis() as u64,
                "Duplicate read discarded"
            );
            return Ok(IntakeOutcome::Duplicate);
        }

        let record = self.queue(code, format, ScanSource::Camera).await?;
        debouncer.record(&record.barcode, now);
        Ok(IntakeOutcome::Queued(record))
    }

    /// Handles a typed entry. Never treated as a duplicate.
    pub async fn submit_manual(&self, code: &str) -> SyncResult<ScanRecord> {
        self.queue(code, MANUAL_FORMAT, ScanSource::Manual).await
    }

    /// The most recent queued scan, for display.
    pub async fn last_scan(&self) -> Option<LastScan> {
        self.last_scan.read().await.clone()
    }

    /// Feeds every event from `events` into [`on_decode`](Self::on_decode)
    /// until the channel closes or the subscription is cancelled.
    pub fn attach(self: &Arc<Self>, mut events: mpsc::Receiver<DecodeEvent>) -> Subscription {
        let intake = Arc::clone(self);

        Subscription::spawn("decoder", move |mut shutdown_rx| async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        // Failures already went to the emitter
                        if let Err(e) = intake.on_decode(&event.code, &event.format).await {
                            debug!(error = %e, "Decode event not queued");
                        }
                    }

                    _ = shutdown_rx.recv() => break,
                }
            }

            debug!("Decoder subscription stopped");
        })
    }

    async fn queue(&self, code: &str, format: &str, source: ScanSource) -> SyncResult<ScanRecord> {
        let barcode = match validate_barcode_with_limit(code, self.max_barcode_len) {
            Ok(barcode) => barcode,
            Err(e) => {
                let err = SyncError::from(e);
                warn!(error = %err, "Scan refused");
                self.emitter.emit_intake_failed(code, &err);
                return Err(err);
            }
        };

        let record = ScanRecord::new(barcode, Utc::now());

        if let Err(e) = self.db.scans().insert(&record).await {
            error!(error = %e, barcode = %record.barcode, "Scan could not be queued");
            let err = SyncError::IntakeRejected(e);
            self.emitter.emit_intake_failed(&record.barcode, &err);
            return Err(err);
        }

        info!(
            id = %record.id,
            barcode = %record.barcode,
            barcode_type = %record.barcode_type,
            ?source,
            "Scan queued"
        );

        let scan = LastScan::from_record(&record, format, source);
        *self.last_scan.write().await = Some(scan.clone());
        self.emitter.emit_scan_ack(&scan);

        self.schedule_sync();
        Ok(record)
    }

    /// Requests one sync after the batch delay, unless one is already waiting.
    fn schedule_sync(&self) {
        if !self.connectivity.is_online() {
            return;
        }
        if self.sync_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let scheduled = Arc::clone(&self.sync_scheduled);
        let delay = self.batch_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            loop {
                scheduled.store(false, Ordering::Release);
                let report = engine.sync().await;
                if report.status != SyncRunStatus::AlreadyRunning {
                    debug!(status = ?report.status, "Scheduled sync finished");
                    break;
                }
                // The run in flight may have started before this scan was queued
                if scheduled.swap(true, Ordering::AcqRel) {
                    break;
                }
                engine.wait_until_idle().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        engine_with, test_db, wait_for, GatedTransport, RecordingEmitter, ScriptedTransport,
    };
    use pretty_assertions::assert_eq;
    use scanq_core::BarcodeType;
    use scanq_db::DbConfig;

    const UPC: &str = "012345678905";

    fn config(batch_delay_ms: u64) -> ScanqConfig {
        let mut config = ScanqConfig::default();
        config.sync.batch_delay_ms = batch_delay_ms;
        config
    }

    struct Fixture {
        db: Database,
        intake: Arc<ScanIntake>,
        transport: Arc<ScriptedTransport>,
        emitter: Arc<RecordingEmitter>,
    }

    async fn fixture_with(db: Database, online: bool, batch_delay_ms: u64) -> Fixture {
        let connectivity = Connectivity::new(online);
        let transport = Arc::new(ScriptedTransport::accept_all());
        let emitter = Arc::new(RecordingEmitter::default());
        let engine = engine_with(&db, &connectivity, Some(transport.clone()));
        let intake = Arc::new(ScanIntake::new(
            db.clone(),
            engine,
            connectivity,
            emitter.clone(),
            &config(batch_delay_ms),
        ));
        Fixture {
            db,
            intake,
            transport,
            emitter,
        }
    }

    async fn fixture(online: bool) -> Fixture {
        fixture_with(test_db().await, online, 1_500).await
    }

    #[tokio::test]
    async fn test_repeat_inside_window_is_one_record() {
        let f = fixture(false).await;
        let t0 = Instant::now();

        let first = f.intake.on_decode_at(UPC, "upc_a", t0).await.unwrap();
        let second = f
            .intake
            .on_decode_at(UPC, "upc_a", t0 + Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(first.record().unwrap().barcode_type, BarcodeType::UpcA);
        assert_eq!(second, IntakeOutcome::Duplicate);
        assert_eq!(f.db.scans().count_by_status().await.unwrap().total, 1);
        assert_eq!(f.emitter.ack_count(), 1);
    }

    #[tokio::test]
    async fn test_repeat_outside_window_is_two_records() {
        let f = fixture(false).await;
        let t0 = Instant::now();

        f.intake.on_decode_at(UPC, "upc_a", t0).await.unwrap();
        let again = f
            .intake
            .on_decode_at(UPC, "upc_a", t0 + Duration::from_secs(3))
            .await
            .unwrap();

        assert!(matches!(again, IntakeOutcome::Queued(_)));
        assert_eq!(f.db.scans().count_by_status().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_every_distinct_read_is_stored() {
        let f = fixture(false).await;
        let t0 = Instant::now();
        let codes = ["A1", "A2", "A1", "A2", "A3"];

        for (i, code) in codes.iter().enumerate() {
            f.intake
                .on_decode_at(code, "code_128", t0 + Duration::from_millis(i as u64 * 100))
                .await
                .unwrap();
        }

        let stored: Vec<String> = f
            .db
            .scans()
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.barcode)
            .collect();
        assert_eq!(stored, codes);
    }

    #[tokio::test]
    async fn test_manual_entry_is_never_duplicate() {
        let f = fixture(false).await;
        let t0 = Instant::now();

        f.intake.on_decode_at(UPC, "upc_a", t0).await.unwrap();
        f.intake.submit_manual(UPC).await.unwrap();
        f.intake.submit_manual(UPC).await.unwrap();
        // Manual entries do not reset the camera window
        let camera = f
            .intake
            .on_decode_at(UPC, "upc_a", t0 + Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(camera, IntakeOutcome::Duplicate);
        assert_eq!(f.db.scans().count_by_status().await.unwrap().total, 3);

        let last = f.intake.last_scan().await.unwrap();
        assert_eq!(last.source, ScanSource::Manual);
        assert_eq!(last.format, MANUAL_FORMAT);
    }

    #[tokio::test]
    async fn test_invalid_barcode_is_reported() {
        let f = fixture(false).await;

        let err = f.intake.submit_manual("   ").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidBarcode(_)));

        let err = f
            .intake
            .on_decode("ABC\u{0}DEF", "code_128")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidBarcode(_)));

        assert_eq!(f.emitter.failure_count(), 2);
        assert!(f.db.scans().count_by_status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_insert_does_not_suppress_retry() {
        let db = Database::new(DbConfig::in_memory().max_records(Some(1)))
            .await
            .unwrap();
        let f = fixture_with(db, false, 1_500).await;
        let t0 = Instant::now();

        f.intake.submit_manual("FIRST").await.unwrap();

        let err = f.intake.on_decode_at(UPC, "upc_a", t0).await.unwrap_err();
        assert!(matches!(err, SyncError::IntakeRejected(ref e) if e.is_storage_full()));
        assert_eq!(f.emitter.failure_count(), 1);

        // Make room, then the same read inside the window must still be accepted
        f.db.scans().clear_all().await.unwrap();
        let retry = f
            .intake
            .on_decode_at(UPC, "upc_a", t0 + Duration::from_millis(200))
            .await
            .unwrap();
        assert!(matches!(retry, IntakeOutcome::Queued(_)));
    }

    #[tokio::test]
    async fn test_close_scans_share_one_sync() {
        let f = fixture_with(test_db().await, true, 100).await;

        for code in ["A1", "A2", "A3"] {
            f.intake.submit_manual(code).await.unwrap();
        }

        let db = f.db.clone();
        wait_for(|| async { db.scans().count_pending().await.unwrap() == 0 }).await;
        assert_eq!(f.transport.batches(), vec![vec!["A1", "A2", "A3"]]);
    }

    #[tokio::test]
    async fn test_scan_during_run_is_sent_after_it() {
        let db = test_db().await;
        let connectivity = Connectivity::new(true);
        let transport = Arc::new(GatedTransport::new());
        let engine = engine_with(&db, &connectivity, Some(transport.clone()));
        let intake = Arc::new(ScanIntake::new(
            db.clone(),
            engine,
            connectivity,
            Arc::new(RecordingEmitter::default()),
            &config(10),
        ));

        intake.submit_manual("A1").await.unwrap();
        transport.wait_until_entered().await;

        // Queued while the first batch is still out
        intake.submit_manual("A2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.calls(), 1);

        transport.release();
        transport.wait_until_entered().await;
        transport.release();

        wait_for(|| async { db.scans().count_pending().await.unwrap() == 0 }).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_offline_intake_does_not_sync() {
        let f = fixture_with(test_db().await, false, 10).await;

        f.intake.submit_manual("A1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(f.transport.calls(), 0);
        assert_eq!(f.db.scans().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attach_consumes_decode_events() {
        let f = fixture(false).await;
        let (tx, rx) = mpsc::channel(8);
        let mut sub = f.intake.attach(rx);

        tx.send(DecodeEvent::new(UPC, "upc_a")).await.unwrap();
        tx.send(DecodeEvent::new(UPC, "upc_a")).await.unwrap();
        tx.send(DecodeEvent::new("96385074", "ean_8")).await.unwrap();

        let db = f.db.clone();
        wait_for(|| async { db.scans().count_by_status().await.unwrap().total == 2 }).await;

        sub.cancel().await;
        assert!(tx.send(DecodeEvent::new("LATE", "code_128")).await.is_err());
        assert_eq!(f.intake.last_scan().await.unwrap().barcode, "96385074");
    }
}
