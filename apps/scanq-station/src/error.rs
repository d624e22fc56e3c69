//! # Station Error Type
//!
//! Everything that can stop the station from starting, plus operator input
//! that does not parse. Failures of individual scans or sync runs are not
//! station errors: they are shown and the station keeps running.

use scanq_db::DbError;
use scanq_sync::SyncError;
use thiserror::Error;

pub type StationResult<T> = Result<T, StationError>;

#[derive(Debug, Error)]
pub enum StationError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local queue could not be opened.
    #[error("Could not open the scan queue: {0}")]
    Database(#[from] DbError),

    /// A session operation failed.
    #[error(transparent)]
    Sync(SyncError),

    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognised console input.
    #[error("{0}")]
    InvalidCommand(String),
}

impl From<SyncError> for StationError {
    fn from(err: SyncError) -> Self {
        if err.is_config_error() {
            StationError::Config(err.to_string())
        } else {
            StationError::Sync(err)
        }
    }
}

impl StationError {
    pub fn invalid_command(message: impl Into<String>) -> Self {
        StationError::InvalidCommand(message.into())
    }
}
