//! # scanq-core: Pure Logic for the Scan Queue
//!
//! This crate holds everything about a scan that can be decided without
//! touching the disk, the network or a clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        scanq Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Capture source (camera decoder / keyboard)            │   │
//! │  │                 onDecode(code, format)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    scanq-sync (Scan Intake)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ uses                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ scanq-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ classify  │  │   dedup   │  │validation │  │   │
//! │  │   │ScanRecord │  │BarcodeType│  │ Debouncer │  │  barcode  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 scanq-db (Local Durable Store)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `ScanRecord`, `QueueCounts`, `SyncOutcome`
//! - [`classify`] - Barcode Classifier (`classify(code) -> BarcodeType`)
//! - [`dedup`] - Short-window de-duplication of repeated camera reads
//! - [`validation`] - Barcode input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use scanq_core::{classify, BarcodeType};
//!
//! assert_eq!(classify("012345678905"), BarcodeType::UpcA);
//! assert_eq!(classify("9780306406157"), BarcodeType::Isbn);
//! assert_eq!(classify(""), BarcodeType::Unknown);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod classify;
pub mod dedup;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use classify::{classify, BarcodeType};
pub use dedup::{DebounceDecision, Debouncer};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Window during which an identical camera read is treated as noise.
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 2_000;

/// Longest barcode accepted by intake.
///
/// Real symbologies stay far below this; anything longer is a decoder glitch
/// or a pasted paragraph.
pub const MAX_BARCODE_LEN: usize = 128;

/// Default number of records shown by the Queue Inspector.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound for a single `list_recent` page.
pub const MAX_PAGE_SIZE: u32 = 500;
