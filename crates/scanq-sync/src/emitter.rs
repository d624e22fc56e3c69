//! # Event Emitter
//!
//! Observable side effects towards the display layer: the scan
//! acknowledgement (beep/haptic), intake failures that must be shown to the
//! operator, sync reports and queue counts.
//!
//! None of these are part of queue correctness. Implementations must return
//! quickly and must not fail.

use scanq_core::{LastScan, QueueCounts};

use crate::engine::SyncReport;
use crate::error::SyncError;

/// Trait for emitting scan events (implemented by the station front end).
pub trait ScanEventEmitter: Send + Sync {
    /// A scan was durably queued.
    fn emit_scan_ack(&self, scan: &LastScan);

    /// A scan was NOT queued. The operator has to be told.
    fn emit_intake_failed(&self, barcode: &str, error: &SyncError);

    /// A sync run finished (including no-op runs).
    fn emit_sync_report(&self, report: &SyncReport);

    /// Queue counts changed.
    fn emit_counts(&self, counts: &QueueCounts);
}

/// No-op event emitter for testing and headless use.
pub struct NoOpEmitter;

impl ScanEventEmitter for NoOpEmitter {
    fn emit_scan_ack(&self, _scan: &LastScan) {}
    fn emit_intake_failed(&self, _barcode: &str, _error: &SyncError) {}
    fn emit_sync_report(&self, _report: &SyncReport) {}
    fn emit_counts(&self, _counts: &QueueCounts) {}
}
