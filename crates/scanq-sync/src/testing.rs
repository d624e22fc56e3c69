//! Test fixtures shared by the engine, intake and session tests.

use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use scanq_core::{LastScan, QueueCounts, ScanRecord};
use scanq_db::{Database, DbConfig};

use crate::connectivity::Connectivity;
use crate::emitter::{NoOpEmitter, ScanEventEmitter};
use crate::engine::{SyncEngine, SyncReport};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{BatchRequest, BatchResponse, ItemResult};
use crate::transport::BatchTransport;

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Inserts one pending record per code, in order.
pub async fn seed(db: &Database, codes: &[&str]) -> Vec<ScanRecord> {
    let mut records = Vec::with_capacity(codes.len());
    for code in codes {
        let record = ScanRecord::new(code, Utc::now());
        db.scans().insert(&record).await.unwrap();
        records.push(record);
    }
    records
}

pub fn engine_with(
    db: &Database,
    connectivity: &Connectivity,
    transport: Option<Arc<dyn BatchTransport>>,
) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(
        db.clone(),
        transport,
        connectivity.clone(),
        Arc::new(NoOpEmitter),
        "dock-test",
        Duration::from_secs(5),
    ))
}

/// Polls `check` until it holds, failing the test after a few seconds.
pub async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn answer(request: &BatchRequest, reject: &[String], reason: &str, limit: usize) -> BatchResponse {
    BatchResponse {
        results: request
            .items
            .iter()
            .take(limit)
            .map(|item| {
                if reject.contains(&item.barcode) {
                    ItemResult::rejected(item.index, item.barcode.clone(), reason)
                } else {
                    ItemResult::accepted(item.index, item.barcode.clone())
                }
            })
            .collect(),
    }
}

// =============================================================================
// Scripted Transport
// =============================================================================

/// Answers every batch from a fixed script and records what it was sent.
pub struct ScriptedTransport {
    reject: Vec<String>,
    reason: String,
    limit: usize,
    fail: bool,
    batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn accept_all() -> Self {
        Self::reject(&[], "")
    }

    pub fn reject(codes: &[&str], reason: &str) -> Self {
        ScriptedTransport {
            reject: codes.iter().map(|c| c.to_string()).collect(),
            reason: reason.to_string(),
            limit: usize::MAX,
            fail: false,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Accepts the first `n` items and says nothing about the rest.
    pub fn answer_first(n: usize) -> Self {
        ScriptedTransport {
            limit: n,
            ..Self::accept_all()
        }
    }

    pub fn failing() -> Self {
        ScriptedTransport {
            fail: true,
            ..Self::accept_all()
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Barcodes of every batch received, in order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn send_batch(&self, request: &BatchRequest) -> SyncResult<BatchResponse> {
        self.batches
            .lock()
            .unwrap()
            .push(request.items.iter().map(|i| i.barcode.clone()).collect());

        if self.fail {
            return Err(SyncError::ConnectionFailed("network unreachable".into()));
        }
        Ok(answer(request, &self.reject, &self.reason, self.limit))
    }

    fn endpoint(&self) -> &str {
        "scripted://inventory"
    }
}

// =============================================================================
// Gated / Hanging Transports
// =============================================================================

/// Blocks inside `send_batch` until the test releases it.
pub struct GatedTransport {
    entered: Notify,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedTransport {
    pub fn new() -> Self {
        GatedTransport {
            entered: Notify::new(),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchTransport for GatedTransport {
    async fn send_batch(&self, request: &BatchRequest) -> SyncResult<BatchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(answer(request, &[], "", usize::MAX))
    }

    fn endpoint(&self) -> &str {
        "gated://inventory"
    }
}

/// Never answers.
pub struct HangingTransport;

#[async_trait]
impl BatchTransport for HangingTransport {
    async fn send_batch(&self, _request: &BatchRequest) -> SyncResult<BatchResponse> {
        std::future::pending().await
    }

    fn endpoint(&self) -> &str {
        "hanging://inventory"
    }
}

// =============================================================================
// Recording Emitter
// =============================================================================

#[derive(Default)]
pub struct RecordingEmitter {
    pub acks: Mutex<Vec<LastScan>>,
    pub failures: Mutex<Vec<(String, String)>>,
    pub reports: Mutex<Vec<SyncReport>>,
    pub counts: Mutex<Vec<QueueCounts>>,
}

impl RecordingEmitter {
    pub fn ack_count(&self) -> usize {
        self.acks.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }

    pub fn last_counts(&self) -> Option<QueueCounts> {
        self.counts.lock().unwrap().last().copied()
    }
}

impl ScanEventEmitter for RecordingEmitter {
    fn emit_scan_ack(&self, scan: &LastScan) {
        self.acks.lock().unwrap().push(scan.clone());
    }

    fn emit_intake_failed(&self, barcode: &str, error: &SyncError) {
        self.failures
            .lock()
            .unwrap()
            .push((barcode.to_string(), error.to_string()));
    }

    fn emit_sync_report(&self, report: &SyncReport) {
        self.reports.lock().unwrap().push(report.clone());
    }

    fn emit_counts(&self, counts: &QueueCounts) {
        self.counts.lock().unwrap().push(*counts);
    }
}
