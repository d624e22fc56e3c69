//! # scanq-db: Durable Scan Queue
//!
//! SQLite-backed storage for accepted scans. Everything here survives a
//! process restart; nothing is deleted except by an explicit, confirmed
//! clear.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        scanq Data Flow                                  │
//! │                                                                         │
//! │  Scan Intake / Sync Engine / Queue Inspector (scanq-sync)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     scanq-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repository   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│  (scan.rs)    │    │  (embedded)  │  │   │
//! │  │   │ WAL + FULL    │    │ ScanRepository│    │ 001_scan...  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  scanq.db in the platform data directory                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanq_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/scanq.db")).await?;
//! db.scans().insert(&record).await?;
//! let pending = db.scans().list_pending().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::scan::ScanRepository;
