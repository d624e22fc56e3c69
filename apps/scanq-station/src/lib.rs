//! # scanq Station
//!
//! Headless scan station: one [`ScanSession`] driven from stdin.
//!
//! ## Module Organization
//! ```text
//! scanq_station_lib/
//! ├── lib.rs          ◄─── Startup, stdin loop, shutdown
//! ├── cli.rs          ◄─── Command line flags
//! ├── commands.rs     ◄─── Console command parsing and execution
//! ├── terminal.rs     ◄─── ScanEventEmitter rendering to stdout
//! └── error.rs        ◄─── StationError
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize logging ─── tracing-subscriber, RUST_LOG or default      │
//! │  2. Load configuration ─── defaults → scanq.toml → SCANQ_* → flags      │
//! │  3. Open the queue ─────── SQLite (WAL), migrations, capacity           │
//! │  4. Start the session ──── connectivity monitor                         │
//! │  5. Read stdin ─────────── until :quit or EOF                           │
//! │  6. Shut down ──────────── stop listeners, bounded best-effort flush    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod terminal;

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scanq_db::{Database, DbConfig};
use scanq_sync::{ScanSession, ScanqConfig};

use cli::Cli;
use commands::{Console, HELP};
use error::{StationError, StationResult};
use terminal::TerminalEmitter;

/// Runs the station until the operator quits or stdin closes.
pub async fn run() -> StationResult<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting scanq station");

    let config = load_config(&cli)?;
    let db = open_database(&config).await?;

    let session =
        ScanSession::from_config(&config, db.clone(), !cli.offline, Arc::new(TerminalEmitter))?;
    session.start().await;

    println!("scanq station {} ({})", config.device.name, config.device_id());
    println!("{}", HELP);

    let mut console = Console::new(&session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match console.handle(&line).await {
            Ok(reply) => {
                for line in &reply.lines {
                    println!("{}", line);
                }
                if reply.quit {
                    break;
                }
            }
            Err(e) => println!("  {}", e),
        }
    }

    // Best effort: wait one request timeout for the flush, then give up.
    // Anything unsent stays pending in the queue for the next start.
    let flush = session.shutdown().await;
    if tokio::time::timeout(config.request_timeout(), flush).await.is_err() {
        warn!("Shutdown flush did not finish in time");
    }

    db.close().await;
    info!("Station stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=scanq_sync=trace` - Trace the sync crate only
/// - Default: `info,scanq=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scanq=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> StationResult<ScanqConfig> {
    let mut config = ScanqConfig::load_or_init(cli.config.clone())?;
    cli.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

async fn open_database(config: &ScanqConfig) -> StationResult<Database> {
    let path = config.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    info!(?path, "Opening scan queue");

    let db = Database::new(DbConfig::new(path).max_records(config.database.max_records))
        .await
        .map_err(StationError::from)?;
    Ok(db)
}
