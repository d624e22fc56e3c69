//! # Terminal Emitter
//!
//! Renders session events on stdout. The acknowledgement rings the terminal
//! bell, the closest thing a terminal has to a beep.

use scanq_core::{LastScan, QueueCounts, ScanRecord};
use scanq_sync::{ScanEventEmitter, SyncError, SyncReport, SyncRunStatus};
use tracing::debug;

const BELL: &str = "\x07";

pub struct TerminalEmitter;

impl ScanEventEmitter for TerminalEmitter {
    fn emit_scan_ack(&self, scan: &LastScan) {
        println!(
            "{}+ {} [{}] {}",
            BELL,
            scan.barcode,
            scan.barcode_type,
            scan.scanned_at.format("%H:%M:%S")
        );
    }

    fn emit_intake_failed(&self, barcode: &str, error: &SyncError) {
        println!("! NOT QUEUED {:?}: {}", barcode, error);
    }

    fn emit_sync_report(&self, report: &SyncReport) {
        match report.status {
            // Silent outcomes; the log has them
            SyncRunStatus::NothingPending | SyncRunStatus::AlreadyRunning => {
                debug!(status = ?report.status, "Sync report");
            }
            _ => println!("{}", describe_report(report)),
        }
    }

    fn emit_counts(&self, counts: &QueueCounts) {
        println!("{}", describe_counts(counts));
    }
}

pub fn describe_report(report: &SyncReport) -> String {
    match report.status {
        SyncRunStatus::Completed => {
            format!("~ sync: {} synced, {} failed", report.synced, report.failed)
        }
        SyncRunStatus::NothingPending => "~ sync: nothing pending".to_string(),
        SyncRunStatus::AlreadyRunning => "~ sync: already running".to_string(),
        _ => format!(
            "~ sync: {}",
            report.error.as_deref().unwrap_or("failed")
        ),
    }
}

pub fn describe_counts(counts: &QueueCounts) -> String {
    format!(
        "  queue: {} total, {} pending, {} synced",
        counts.total, counts.pending, counts.synced
    )
}

pub fn describe_record(record: &ScanRecord) -> String {
    let state = if record.synced { "synced " } else { "pending" };
    let mut line = format!(
        "  {} {} {:<14} {:<8} attempts={}",
        record.scanned_at.format("%Y-%m-%d %H:%M:%S"),
        state,
        record.barcode,
        record.barcode_type.label(),
        record.sync_attempts
    );
    if let Some(ref error) = record.last_error {
        line.push_str(&format!("  last error: {}", error));
    }
    line
}
