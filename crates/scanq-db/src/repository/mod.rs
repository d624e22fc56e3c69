//! # Repository Module
//!
//! All SQL for the scan queue lives behind [`ScanRepository`](scan::ScanRepository).
//!
//! ```text
//!  Scan Intake      ── insert
//!  Sync Engine      ── list_pending, apply_batch_outcomes
//!  Queue Inspector  ── list_recent, count_by_status, clear_all
//! ```

pub mod scan;
