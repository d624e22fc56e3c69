//! # Error Types
//!
//! Domain-specific error types for scanq-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  scanq-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Barcode input failures                         │
//! │                                                                         │
//! │  scanq-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures (incl. StorageFull)             │
//! │                                                                         │
//! │  scanq-sync errors (separate crate)                                    │
//! │  └── SyncError        - Intake rejection, transport, config            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → station notice        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored barcode type label is not one we know.
    ///
    /// ## When This Occurs
    /// - A row written by a newer build is read by an older one
    /// - A label was typed by hand into config or a fixture
    #[error("Unknown barcode type label: {0}")]
    UnknownBarcodeType(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a scan ever reaches the store, so a rejected input never
/// produces a row.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., embedded control characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
