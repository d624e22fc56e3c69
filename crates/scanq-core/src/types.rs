//! # Domain Types
//!
//! Types shared by the store, the sync engine and the display layer.
//!
//! ## ScanRecord Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ScanRecord Lifecycle                              │
//! │                                                                         │
//! │  Scan Intake ── insert ──► synced=false, sync_attempts=0               │
//! │                                   │                                     │
//! │                      Sync Engine  │  (batch answered)                   │
//! │                  ┌────────────────┴────────────────┐                   │
//! │                  ▼                                 ▼                    │
//! │        Accepted: synced=true            Rejected: synced=false         │
//! │                  last_error=NULL                  last_error=reason     │
//! │                  (never re-sent)                  (next run retries)    │
//! │                                                                         │
//! │  Queue Inspector ── clear_all (confirmed) ──► row gone                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Field Ownership
//! - `id`, `barcode`, `barcode_type`, `scanned_at`: written once by Scan Intake
//! - `synced`, `sync_attempts`, `last_error`: written only by the Sync Engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::classify::{classify, BarcodeType};

// =============================================================================
// Scan Record
// =============================================================================

/// One accepted scan, persisted in the local queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ScanRecord {
    /// Locally generated identifier (UUID v4). Never sent to the endpoint.
    pub id: String,

    /// Raw decoded string (trimmed).
    pub barcode: String,

    /// Classifier output at intake time.
    pub barcode_type: BarcodeType,

    /// Capture timestamp from the device clock.
    #[ts(as = "String")]
    pub scanned_at: DateTime<Utc>,

    /// Set once the endpoint acknowledged this record. Never reverts.
    pub synced: bool,

    /// Number of answered batches that included this record.
    pub sync_attempts: i64,

    /// Reason for the most recent rejection, cleared on success.
    pub last_error: Option<String>,
}

impl ScanRecord {
    /// Builds a fresh, unsynced record for `barcode`, classifying it on the way.
    ///
    /// ## Example
    /// ```rust
    /// use scanq_core::{BarcodeType, ScanRecord};
    ///
    /// let record = ScanRecord::new("012345678905", chrono::Utc::now());
    /// assert_eq!(record.barcode_type, BarcodeType::UpcA);
    /// assert!(!record.synced);
    /// assert_eq!(record.sync_attempts, 0);
    /// ```
    pub fn new(barcode: &str, scanned_at: DateTime<Utc>) -> Self {
        let barcode = barcode.trim();
        ScanRecord {
            id: Uuid::new_v4().to_string(),
            barcode: barcode.to_string(),
            barcode_type: classify(barcode),
            scanned_at,
            synced: false,
            sync_attempts: 0,
            last_error: None,
        }
    }

    /// True while the record still waits for an acknowledgement.
    #[inline]
    pub fn is_pending(&self) -> bool {
        !self.synced
    }
}

// =============================================================================
// Queue Counts
// =============================================================================

/// Aggregate over every stored record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QueueCounts {
    pub total: i64,
    pub pending: i64,
    pub synced: i64,
}

impl QueueCounts {
    /// True when there is nothing stored at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

// =============================================================================
// Sync Outcome
// =============================================================================

/// Per-record result of one answered batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The endpoint kept the record.
    Accepted,
    /// The endpoint answered but refused this record.
    Rejected { reason: String },
}

impl SyncOutcome {
    /// Convenience constructor for rejections.
    pub fn rejected(reason: impl Into<String>) -> Self {
        SyncOutcome::Rejected {
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, SyncOutcome::Accepted)
    }

    /// The error to store in `last_error`, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            SyncOutcome::Accepted => None,
            SyncOutcome::Rejected { reason } => Some(reason),
        }
    }
}

// =============================================================================
// Capture Types
// =============================================================================

/// Where a scan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    /// Camera / hardware decoder, subject to de-duplication.
    Camera,
    /// Typed by the operator. Never treated as a duplicate.
    Manual,
}

/// One decode event from the capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeEvent {
    pub code: String,
    /// Symbology reported by the decoder (e.g. "ean_13"). Informational only.
    pub format: String,
}

impl DecodeEvent {
    pub fn new(code: impl Into<String>, format: impl Into<String>) -> Self {
        DecodeEvent {
            code: code.into(),
            format: format.into(),
        }
    }
}

/// In-memory "last scan" display state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LastScan {
    pub barcode: String,
    pub barcode_type: BarcodeType,
    pub format: String,
    pub source: ScanSource,
    #[ts(as = "String")]
    pub scanned_at: DateTime<Utc>,
}

impl LastScan {
    pub fn from_record(record: &ScanRecord, format: &str, source: ScanSource) -> Self {
        LastScan {
            barcode: record.barcode.clone(),
            barcode_type: record.barcode_type,
            format: format.to_string(),
            source,
            scanned_at: record.scanned_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_pending() {
        let record = ScanRecord::new(" 012345678905 ", Utc::now());
        assert_eq!(record.barcode, "012345678905");
        assert_eq!(record.barcode_type, BarcodeType::UpcA);
        assert!(record.is_pending());
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_new_records_get_distinct_ids() {
        let now = Utc::now();
        let a = ScanRecord::new("96385074", now);
        let b = ScanRecord::new("96385074", now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_sync_outcome_error() {
        assert_eq!(SyncOutcome::Accepted.error(), None);
        assert_eq!(
            SyncOutcome::rejected("malformed barcode").error(),
            Some("malformed barcode")
        );
        assert!(SyncOutcome::Accepted.is_accepted());
    }

    #[test]
    fn test_queue_counts_default_is_empty() {
        assert!(QueueCounts::default().is_empty());
    }
}
