//! # Batch Wire Protocol
//!
//! JSON exchanged with the inventory endpoint, and the mapping of its answer
//! back onto local records.
//!
//! ## Request / Response
//! ```text
//! POST {endpoint_url}
//! {
//!   "device_id": "dock-3",
//!   "batch_id":  "9b2c...",
//!   "items": [
//!     { "index": 0, "barcode": "012345678905", "barcode_type": "UPC-A",
//!       "scanned_at": "2024-05-01T10:15:00Z" },
//!     { "index": 1, "barcode": "BAD?",         "barcode_type": "CODE-128", ... }
//!   ]
//! }
//!
//! 200 OK
//! {
//!   "results": [
//!     { "index": 0, "barcode": "012345678905", "success": true,  "error": null },
//!     { "index": 1, "barcode": "BAD?",         "success": false, "error": "malformed barcode" }
//!   ]
//! }
//! ```
//!
//! ## Keying
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ result.index present?  ── yes ──► items[index]                    │
//! │        │ no                                                       │
//! │        └──────────────────────► items[position in results]        │
//! │                                                                   │
//! │ echoed barcode ≠ submitted ──► failure, record stays pending      │
//! │ item with no result        ──► failure, record stays pending      │
//! │ duplicate / out-of-range   ──► ignored (first result wins)        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Local record ids never leave the device; the batch index is the key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use scanq_core::{BarcodeType, ScanRecord, SyncOutcome};

/// Failure recorded when the echoed barcode does not match the submitted item.
pub const OUTCOME_MISMATCH: &str = "outcome does not match submitted barcode";

/// Failure recorded for submitted items the response did not mention.
pub const OUTCOME_MISSING: &str = "no outcome reported by server";

/// Failure recorded when the endpoint says no without a reason.
pub const OUTCOME_REJECTED: &str = "rejected by server";

// =============================================================================
// Request
// =============================================================================

/// One batch POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub device_id: String,
    /// Fresh per transmit; lets the endpoint log and de-duplicate retries.
    pub batch_id: String,
    pub items: Vec<BatchItem>,
}

/// One submitted scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub barcode: String,
    pub barcode_type: BarcodeType,
    pub scanned_at: DateTime<Utc>,
}

impl BatchRequest {
    /// Builds the request for `pending`, preserving its order as the index.
    pub fn from_records(device_id: &str, pending: &[ScanRecord]) -> Self {
        let items = pending
            .iter()
            .enumerate()
            .map(|(index, record)| BatchItem {
                index,
                barcode: record.barcode.clone(),
                barcode_type: record.barcode_type,
                scanned_at: record.scanned_at,
            })
            .collect();

        BatchRequest {
            device_id: device_id.to_string(),
            batch_id: Uuid::new_v4().to_string(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Response
// =============================================================================

/// The endpoint's answer to one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<ItemResult>,
}

/// Outcome for one submitted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Batch index of the item. When absent, the result's position is used.
    #[serde(default)]
    pub index: Option<usize>,
    /// The submitted barcode, echoed back for verification.
    pub barcode: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn accepted(index: usize, barcode: impl Into<String>) -> Self {
        ItemResult {
            index: Some(index),
            barcode: barcode.into(),
            success: true,
            error: None,
        }
    }

    pub fn rejected(index: usize, barcode: impl Into<String>, error: impl Into<String>) -> Self {
        ItemResult {
            index: Some(index),
            barcode: barcode.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Outcome Mapping
// =============================================================================

/// Maps a response onto the records that were submitted, in submission order.
///
/// Every submitted record gets exactly one outcome.
pub fn map_outcomes(
    pending: &[ScanRecord],
    response: &BatchResponse,
) -> Vec<(String, SyncOutcome)> {
    let mut slots: Vec<Option<SyncOutcome>> = vec![None; pending.len()];

    for (position, result) in response.results.iter().enumerate() {
        let index = result.index.unwrap_or(position);

        let Some(record) = pending.get(index) else {
            warn!(index, barcode = %result.barcode, "Outcome for an index that was not submitted");
            continue;
        };

        if slots[index].is_some() {
            warn!(index, "Duplicate outcome for batch item, keeping the first");
            continue;
        }

        let outcome = if result.barcode != record.barcode {
            warn!(
                index,
                submitted = %record.barcode,
                echoed = %result.barcode,
                "Outcome does not match submitted barcode"
            );
            SyncOutcome::rejected(OUTCOME_MISMATCH)
        } else if result.success {
            SyncOutcome::Accepted
        } else {
            SyncOutcome::rejected(
                result
                    .error
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| OUTCOME_REJECTED.to_string()),
            )
        };

        slots[index] = Some(outcome);
    }

    pending
        .iter()
        .zip(slots)
        .map(|(record, slot)| {
            let outcome = slot.unwrap_or_else(|| SyncOutcome::rejected(OUTCOME_MISSING));
            (record.id.clone(), outcome)
        })
        .collect()
}
