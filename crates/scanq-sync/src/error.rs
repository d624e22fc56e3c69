//! # Sync Error Types
//!
//! Error types for intake, sync and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  DeserializationFailed  │ │
//! │  │  InvalidUrl     │  │  HttpStatus     │  │                         │ │
//! │  │  NotConfigured  │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Intake       │  │    Database     │                              │
//! │  │                 │  │                 │                              │
//! │  │  IntakeRejected │  │  DatabaseError  │                              │
//! │  │  InvalidBarcode │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these is fatal. The worst outcome of any of them is a scan that
//! stays pending and visible in the queue.

use scanq_core::ValidationError;
use scanq_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type covering intake, sync and configuration failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured")]
    MissingDeviceId,

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// No endpoint URL configured, so there is nowhere to sync to.
    #[error("Sync endpoint not configured")]
    NotConfigured,

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The endpoint could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the bounded wait.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The endpoint answered with a non-2xx status. Treated like no answer.
    #[error("Endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to serialize the batch.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// The response body was not a valid batch response.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Intake Errors
    // =========================================================================
    /// The store refused to persist an accepted scan.
    ///
    /// ## When This Occurs
    /// - Queue capacity (`max_records`) reached
    /// - Disk full or database unavailable
    ///
    /// The scan is *not* queued; the operator must be told.
    #[error("Scan was not queued: {0}")]
    IntakeRejected(#[source] DbError),

    /// The decoded string is not acceptable as a barcode.
    #[error("Invalid barcode: {0}")]
    InvalidBarcode(#[from] ValidationError),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database operation failed outside of intake.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::ConnectionFailed(format!("request timed out: {}", err))
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a later sync run may succeed without anyone changing
    /// anything.
    ///
    /// There is no retry loop in the engine; this only tells the caller
    /// whether "try again later" is a sensible message.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::HttpStatus { .. }
                | SyncError::DatabaseError(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::NotConfigured
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the batch never got an answer (nothing was mutated).
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::HttpStatus { .. }
                | SyncError::DeserializationFailed(_)
        )
    }
}
