//! # Subscriptions
//!
//! Cancellation handle for a background listener (decode channel, online /
//! offline transitions).
//!
//! ```text
//!  Subscription::spawn("connectivity", |shutdown_rx| async move { ... })
//!        │
//!        ├── cancel().await   graceful: signal + wait for the task to end
//!        └── drop             abort, so a forgotten handle never leaks a task
//! ```

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a spawned listener task.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns `task`, handing it the receiver it must select on to stop.
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(task(shutdown_rx));
        debug!(subscription = name, "Subscription started");

        Subscription {
            name,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True until the task has finished or been cancelled.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the listener and waits for it to wind down.
    pub async fn cancel(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(subscription = self.name, "Subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
