//! # Scan Session
//!
//! One device session: owns a single instance of every component, so two
//! sessions (two tests, two stations in one process) never share state.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ScanSession::from_config(config, db, emitter)                          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  start()            spawn ConnectivityMonitor                           │
//! │  attach_decoder(rx) spawn decoder listener                              │
//! │        │                                                                │
//! │        │  intake() / engine() / inspector() / connectivity()            │
//! │        ▼                                                                │
//! │  shutdown()         cancel listeners, best-effort flush                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use scanq_core::{DecodeEvent, LastScan, QueueCounts};
use scanq_db::Database;

use crate::config::ScanqConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::emitter::ScanEventEmitter;
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::inspector::QueueInspector;
use crate::intake::ScanIntake;
use crate::subscription::Subscription;
use crate::transport::{BatchTransport, HttpTransport};

/// Snapshot for the status line.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub online: bool,
    pub sync_in_flight: bool,
    pub counts: QueueCounts,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_scan: Option<LastScan>,
}

pub struct ScanSession {
    db: Database,
    connectivity: Connectivity,
    engine: Arc<SyncEngine>,
    intake: Arc<ScanIntake>,
    inspector: QueueInspector,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ScanSession {
    /// Wires the components around an explicit transport.
    pub fn new(
        config: &ScanqConfig,
        db: Database,
        transport: Option<Arc<dyn BatchTransport>>,
        connectivity: Connectivity,
        emitter: Arc<dyn ScanEventEmitter>,
    ) -> Self {
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            transport,
            connectivity.clone(),
            Arc::clone(&emitter),
            config.device_id(),
            config.request_timeout(),
        ));

        let intake = Arc::new(ScanIntake::new(
            db.clone(),
            Arc::clone(&engine),
            connectivity.clone(),
            Arc::clone(&emitter),
            config,
        ));

        let inspector = QueueInspector::new(db.clone(), emitter, &config.queue);

        ScanSession {
            db,
            connectivity,
            engine,
            intake,
            inspector,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Wires the components with the HTTP transport described by `config`.
    pub fn from_config(
        config: &ScanqConfig,
        db: Database,
        online: bool,
        emitter: Arc<dyn ScanEventEmitter>,
    ) -> SyncResult<Self> {
        let transport = HttpTransport::from_config(config)?
            .map(|t| Arc::new(t) as Arc<dyn BatchTransport>);

        if transport.is_none() {
            info!("No sync endpoint configured, scans will only queue locally");
        }

        Ok(Self::new(
            config,
            db,
            transport,
            Connectivity::new(online),
            emitter,
        ))
    }

    /// Starts the connectivity monitor.
    pub async fn start(&self) {
        let monitor = ConnectivityMonitor::spawn(
            &self.connectivity,
            self.db.clone(),
            Arc::clone(&self.engine),
        );
        self.subscriptions.lock().await.push(monitor);
        info!(online = self.connectivity.is_online(), "Scan session started");
    }

    /// Feeds a decoder channel into the intake for the rest of the session.
    pub async fn attach_decoder(&self, events: mpsc::Receiver<DecodeEvent>) {
        let subscription = self.intake.attach(events);
        self.subscriptions.lock().await.push(subscription);
    }

    pub async fn status(&self) -> SyncResult<SessionStatus> {
        let counts = self.inspector.counts().await?;
        let engine = self.engine.status().await;

        Ok(SessionStatus {
            online: self.connectivity.is_online(),
            sync_in_flight: engine.in_flight,
            counts,
            last_sync_at: engine.last_sync_at,
            last_error: engine.last_error,
            last_scan: self.intake.last_scan().await,
        })
    }

    /// Cancels every listener, then starts a best-effort flush.
    ///
    /// The returned handle may be awaited or dropped. Dropping it (or the
    /// runtime going away) loses nothing durable: unsent scans stay pending.
    pub async fn shutdown(&self) -> JoinHandle<()> {
        let mut subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for subscription in subscriptions.iter_mut() {
            subscription.cancel().await;
        }
        debug!(cancelled = subscriptions.len(), "Session listeners stopped");

        self.engine.flush_best_effort()
    }

    pub fn intake(&self) -> &Arc<ScanIntake> {
        &self.intake
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn inspector(&self) -> &QueueInspector {
        &self.inspector
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
