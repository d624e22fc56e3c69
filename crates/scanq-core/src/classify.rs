//! # Barcode Classifier
//!
//! Maps a decoded string to a semantic barcode kind using length and
//! prefix rules only. Check digits are not verified: the decoder already did
//! that for camera reads, and the endpoint re-validates everything it keeps.
//!
//! ## Precedence (first match wins)
//! ```text
//! ┌──────┬──────────────────────────────────────────────┬──────────────┐
//! │ Step │ Rule                                         │ Result       │
//! ├──────┼──────────────────────────────────────────────┼──────────────┤
//! │  1   │ 12 digits                                    │ UPC-A        │
//! │  2   │ 6 digits, or 8 digits starting with 0 or 1   │ UPC-E        │
//! │  3   │ 13 digits starting with 978 / 979            │ ISBN         │
//! │  4   │ 13 digits                                    │ EAN-13       │
//! │  5   │ 8 digits                                     │ EAN-8        │
//! │  6   │ 9 digits + check char (digit or X)           │ ISBN         │
//! │  7   │ 1-43 chars of the Code 39 alphabet           │ CODE-39      │
//! │  8   │ 1-80 printable ASCII chars                   │ CODE-128     │
//! │  -   │ anything else                                │ UNKNOWN      │
//! └──────┴──────────────────────────────────────────────┴──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;

/// Maximum payload length for a Code 39 symbol we are willing to call Code 39.
const CODE39_MAX_LEN: usize = 43;

/// Maximum length for the generic Code 128 fallback.
const CODE128_MAX_LEN: usize = 80;

// =============================================================================
// Barcode Type
// =============================================================================

/// Semantic barcode kind.
///
/// The string labels (`"UPC-A"`, `"EAN-13"`, ...) are used for storage, the
/// wire protocol and display alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum BarcodeType {
    #[serde(rename = "UPC-A")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "UPC-A"))]
    UpcA,

    #[serde(rename = "UPC-E")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "UPC-E"))]
    UpcE,

    #[serde(rename = "EAN-13")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EAN-13"))]
    Ean13,

    #[serde(rename = "EAN-8")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EAN-8"))]
    Ean8,

    #[serde(rename = "ISBN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ISBN"))]
    Isbn,

    #[serde(rename = "CODE-128")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CODE-128"))]
    Code128,

    #[serde(rename = "CODE-39")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CODE-39"))]
    Code39,

    #[serde(rename = "UNKNOWN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "UNKNOWN"))]
    Unknown,
}

impl BarcodeType {
    /// All variants in classifier precedence order, `Unknown` last.
    pub const ALL: [BarcodeType; 8] = [
        BarcodeType::UpcA,
        BarcodeType::UpcE,
        BarcodeType::Isbn,
        BarcodeType::Ean13,
        BarcodeType::Ean8,
        BarcodeType::Code39,
        BarcodeType::Code128,
        BarcodeType::Unknown,
    ];

    /// Storage / wire label.
    pub const fn label(&self) -> &'static str {
        match self {
            BarcodeType::UpcA => "UPC-A",
            BarcodeType::UpcE => "UPC-E",
            BarcodeType::Ean13 => "EAN-13",
            BarcodeType::Ean8 => "EAN-8",
            BarcodeType::Isbn => "ISBN",
            BarcodeType::Code128 => "CODE-128",
            BarcodeType::Code39 => "CODE-39",
            BarcodeType::Unknown => "UNKNOWN",
        }
    }

    /// True for GTIN-family retail symbologies (UPC/EAN/ISBN).
    pub const fn is_retail(&self) -> bool {
        matches!(
            self,
            BarcodeType::UpcA
                | BarcodeType::UpcE
                | BarcodeType::Ean13
                | BarcodeType::Ean8
                | BarcodeType::Isbn
        )
    }
}

impl fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BarcodeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarcodeType::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownBarcodeType(s.to_string()))
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classifies a decoded barcode string.
///
/// Total and deterministic: every input maps to exactly one [`BarcodeType`],
/// with [`BarcodeType::Unknown`] as the fallback. Surrounding whitespace is
/// ignored.
///
/// ## Example
/// ```rust
/// use scanq_core::{classify, BarcodeType};
///
/// assert_eq!(classify("012345678905"), BarcodeType::UpcA);
/// assert_eq!(classify("96385074"), BarcodeType::Ean8);
/// assert_eq!(classify("ABC-123"), BarcodeType::Code39);
/// assert_eq!(classify("abc-123"), BarcodeType::Code128);
/// ```
pub fn classify(code: &str) -> BarcodeType {
    let code = code.trim();
    let len = code.len();
    let numeric = len > 0 && code.bytes().all(|b| b.is_ascii_digit());

    if numeric {
        match len {
            12 => return BarcodeType::UpcA,
            6 => return BarcodeType::UpcE,
            8 if code.starts_with('0') || code.starts_with('1') => return BarcodeType::UpcE,
            13 if code.starts_with("978") || code.starts_with("979") => {
                return BarcodeType::Isbn
            }
            13 => return BarcodeType::Ean13,
            8 => return BarcodeType::Ean8,
            _ => {}
        }
    }

    if is_isbn10(code) {
        return BarcodeType::Isbn;
    }

    if is_code39(code) {
        return BarcodeType::Code39;
    }

    if (1..=CODE128_MAX_LEN).contains(&len) && code.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return BarcodeType::Code128;
    }

    BarcodeType::Unknown
}

/// Nine digits followed by a digit or `X`.
fn is_isbn10(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 10
        && bytes[..9].iter().all(u8::is_ascii_digit)
        && (bytes[9].is_ascii_digit() || bytes[9] == b'X')
}

fn is_code39(code: &str) -> bool {
    // Some decoders hand back the start/stop asterisks
    let payload = match code.strip_prefix('*').and_then(|c| c.strip_suffix('*')) {
        Some(inner) => inner,
        None => code,
    };

    (1..=CODE39_MAX_LEN).contains(&payload.len())
        && payload.bytes().all(|b| {
            b.is_ascii_uppercase()
                || b.is_ascii_digit()
                || matches!(b, b'-' | b'.' | b' ' | b'$' | b'/' | b'+' | b'%')
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
