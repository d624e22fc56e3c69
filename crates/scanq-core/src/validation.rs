//! # Validation Module
//!
//! Input validation for barcodes before they reach the store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Capture source                                               │
//! │  └── Decoder only emits symbols it could read                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Scan Intake (Rust)                                           │
//! │  └── THIS MODULE: empty / length / control characters                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── Immutability + monotonic `synced` triggers                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Classification is *not* validation: a code the classifier calls
//! `UNKNOWN` is still accepted and queued.

use crate::error::ValidationError;
use crate::MAX_BARCODE_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a barcode with the default length limit.
///
/// ## Example
/// ```rust
/// use scanq_core::validation::validate_barcode;
///
/// assert_eq!(validate_barcode("  012345678905 ").unwrap(), "012345678905");
/// assert!(validate_barcode("   ").is_err());
/// ```
pub fn validate_barcode(code: &str) -> ValidationResult<&str> {
    validate_barcode_with_limit(code, MAX_BARCODE_LEN)
}

/// Validates a barcode and returns the trimmed value.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max_len` characters
/// - No control characters (tabs, newlines, NUL...) inside the code
pub fn validate_barcode_with_limit(code: &str, max_len: usize) -> ValidationResult<&str> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if code.chars().count() > max_len {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: max_len,
        });
    }

    if code.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(code)
}

/// Validates a page size against an upper bound.
///
/// `field` names the setting in the error.
pub fn validate_page_size(field: &str, limit: u32, max: u32) -> ValidationResult<u32> {
    if limit == 0 || limit > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: i64::from(max),
        });
    }

    Ok(limit)
}

// =============================================================================
// Unit Tests
// =============================================================================
