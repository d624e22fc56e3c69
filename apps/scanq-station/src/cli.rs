//! Command line arguments.

use clap::Parser;
use std::path::PathBuf;

use scanq_sync::ScanqConfig;

/// Offline-first barcode scan station.
///
/// Reads manual entries and `:commands` from stdin. Type `:help` once
/// running.
#[derive(Debug, Clone, Parser)]
#[command(name = "scanq-station", version, about)]
pub struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, env = "SCANQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite file holding the queue.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Inventory endpoint receiving the batches.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Start offline (use `:online` to connect).
    #[arg(long)]
    pub offline: bool,
}

impl Cli {
    /// Command line flags win over file and environment.
    pub fn apply_to(&self, config: &mut ScanqConfig) {
        if let Some(ref db) = self.db {
            config.database.path = Some(db.clone());
        }
        if let Some(ref endpoint) = self.endpoint {
            config.sync.endpoint_url = Some(endpoint.clone());
        }
    }
}
