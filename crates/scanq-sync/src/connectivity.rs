//! # Connectivity
//!
//! The single shared online flag, and the monitor that turns an
//! offline→online transition into one sync run.
//!
//! ## Transition Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   host: "offline" ──► set_online(false)   no sync, ever                │
//! │                                                                         │
//! │   host: "online"  ──► set_online(true)                                 │
//! │                            │ (was offline)                              │
//! │                            ▼                                            │
//! │                   ConnectivityMonitor                                   │
//! │                            │                                            │
//! │            pending > 0 ? ──┼── no ──► nothing to do                     │
//! │                            │ yes                                        │
//! │         run in flight ? ───┼── yes ─► wait for it to finish             │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                    SyncEngine::sync()  (exactly one)                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use scanq_db::Database;

use crate::engine::SyncEngine;
use crate::subscription::Subscription;

/// Transition reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

// =============================================================================
// Connectivity
// =============================================================================

/// Shared online/offline flag. Clones observe and update the same value.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Connectivity { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag. Returns true if it actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Applies a host event.
    pub fn apply(&self, event: ConnectivityEvent) -> bool {
        self.set_online(event == ConnectivityEvent::Online)
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::new(true)
    }
}

// =============================================================================
// Connectivity Monitor
// =============================================================================

/// Triggers a sync when the device comes back online.
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Starts watching `connectivity`. Drop or cancel the returned
    /// subscription to stop.
    pub fn spawn(
        connectivity: &Connectivity,
        db: Database,
        engine: Arc<SyncEngine>,
    ) -> Subscription {
        let mut rx = connectivity.subscribe();

        Subscription::spawn("connectivity", move |mut shutdown_rx| async move {
            let mut was_online = *rx.borrow_and_update();

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *rx.borrow_and_update();
                        if online && !was_online {
                            tokio::spawn(Self::on_reconnect(db.clone(), Arc::clone(&engine)));
                        }
                        was_online = online;
                    }

                    _ = shutdown_rx.recv() => break,
                }
            }

            debug!("Connectivity monitor stopped");
        })
    }

    async fn on_reconnect(db: Database, engine: Arc<SyncEngine>) {
        // A run from before the drop may still hold the guard
        if engine.is_in_flight() {
            debug!("Back online, waiting for the sync in flight");
            engine.wait_until_idle().await;
        }

        match db.scans().count_pending().await {
            Ok(0) => debug!("Back online, nothing pending"),
            Ok(pending) => {
                info!(pending, "Back online, syncing pending scans");
                let report = engine.sync().await;
                debug!(status = ?report.status, "Reconnect sync finished");
            }
            Err(e) => warn!(error = %e, "Back online, but pending count failed"),
        }
    }
}
