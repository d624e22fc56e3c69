//! # scanq-sync: Offline-First Scan Queue Engine
//!
//! Scan Intake, the Sync Engine, connectivity tracking and the Queue
//! Inspector, wired together by a [`ScanSession`].
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  capture source ──(code, format)──► ScanIntake                         │
//! │                                        │ dedup window (camera only)    │
//! │                                        │ classify + validate           │
//! │                                        ▼                                │
//! │                                   scan_records (scanq-db)              │
//! │                                        │                                │
//! │          ┌─────────────────────────────┤                                │
//! │          │ delayed request             │ online transition              │
//! │          ▼                             ▼                                │
//! │      SyncEngine ◄──────────── ConnectivityMonitor                       │
//! │          │  at most one run in flight                                   │
//! │          ▼                                                              │
//! │    BatchTransport ──POST──► inventory endpoint                          │
//! │          │                                                              │
//! │          ▼ per-item outcomes                                            │
//! │     scan_records (synced / last_error) ──► QueueInspector (read-only)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - Owns one instance of every component
//! - [`intake`] - Decode events and manual entry into the queue
//! - [`engine`] - Batch sync with the in-flight guard
//! - [`connectivity`] - Shared online flag and the reconnect trigger
//! - [`inspector`] - Listing and confirmed clearing
//! - [`protocol`] - Wire format and outcome mapping
//! - [`transport`] - `BatchTransport` trait and the HTTP implementation
//! - [`config`] - TOML + environment configuration
//! - [`emitter`] - Event seam towards the display layer
//! - [`subscription`] - Cancellation handles for background listeners

pub mod config;
pub mod connectivity;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod inspector;
pub mod intake;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ScanqConfig;
pub use connectivity::{Connectivity, ConnectivityEvent, ConnectivityMonitor};
pub use emitter::{NoOpEmitter, ScanEventEmitter};
pub use engine::{EngineStatus, SyncEngine, SyncReport, SyncRunStatus};
pub use error::{SyncError, SyncResult};
pub use inspector::{ClearConfirmation, ClearPrompt, QueueInspector};
pub use intake::{IntakeOutcome, ScanIntake};
pub use session::{ScanSession, SessionStatus};
pub use subscription::Subscription;
pub use transport::{BatchTransport, HttpTransport};
