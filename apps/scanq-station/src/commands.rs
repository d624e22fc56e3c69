//! # Console Commands
//!
//! One line of operator input in, a few lines of text out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  012345678905          manual entry                                     │
//! │  :scan CODE [FORMAT]   simulated camera decode (de-duplicated)          │
//! │  :online / :offline    connectivity transition                          │
//! │  :sync                 sync now                                         │
//! │  :list [N]             most recent scans                                │
//! │  :status               session status                                   │
//! │  :clear                delete every scan (asks for "yes")               │
//! │  :help / :quit                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scan acknowledgements, intake failures and sync reports are printed by
//! the [`TerminalEmitter`](crate::terminal::TerminalEmitter), not here.

use scanq_sync::{ClearPrompt, ConnectivityEvent, IntakeOutcome, ScanSession};
use tracing::debug;

use crate::error::{StationError, StationResult};
use crate::terminal::{describe_counts, describe_record};

const CAMERA_FORMAT: &str = "console";

pub const HELP: &str = "\
  <code>               queue a manual entry
  :scan CODE [FORMAT]  simulate a camera read
  :online | :offline   change connectivity
  :sync                sync pending scans now
  :list [N]            show the most recent scans
  :status              show queue and sync status
  :clear               delete every scan
  :quit                flush and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Manual(String),
    Scan { code: String, format: String },
    Online,
    Offline,
    Sync,
    List(Option<u32>),
    Status,
    Clear,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> StationResult<Command> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }

        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Manual(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        let command = match (name, args.as_slice()) {
            ("scan", [code]) => Command::Scan {
                code: code.to_string(),
                format: CAMERA_FORMAT.to_string(),
            },
            ("scan", [code, format]) => Command::Scan {
                code: code.to_string(),
                format: format.to_string(),
            },
            ("scan", _) => return Err(StationError::invalid_command("usage: :scan CODE [FORMAT]")),
            ("online", []) => Command::Online,
            ("offline", []) => Command::Offline,
            ("sync", []) => Command::Sync,
            ("list", []) => Command::List(None),
            ("list", [n]) => Command::List(Some(n.parse().map_err(|_| {
                StationError::invalid_command(format!("not a number: {}", n))
            })?)),
            ("status", []) => Command::Status,
            ("clear", []) => Command::Clear,
            ("help", []) => Command::Help,
            ("quit", []) | ("q", []) | ("exit", []) => Command::Quit,
            _ => {
                return Err(StationError::invalid_command(format!(
                    "unknown command ':{}', try :help",
                    rest
                )))
            }
        };
        Ok(command)
    }
}

/// Text produced by one line of input.
#[derive(Debug, Default)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Reply {
            lines: vec![text.into()],
            quit: false,
        }
    }
}

/// Line-oriented driver for a session.
pub struct Console<'a> {
    session: &'a ScanSession,
    pending_clear: Option<ClearPrompt>,
}

impl<'a> Console<'a> {
    pub fn new(session: &'a ScanSession) -> Self {
        Console {
            session,
            pending_clear: None,
        }
    }

    pub async fn handle(&mut self, line: &str) -> StationResult<Reply> {
        // A pending clear consumes the next line as its answer
        if let Some(prompt) = self.pending_clear.take() {
            if line.trim().eq_ignore_ascii_case("yes") {
                let deleted = self
                    .session
                    .inspector()
                    .clear_all(prompt.confirm())
                    .await?;
                return Ok(Reply::line(format!("  cleared {} scans", deleted)));
            }
            return Ok(Reply::line("  clear cancelled"));
        }

        let command = Command::parse(line)?;
        self.execute(command).await
    }

    async fn execute(&mut self, command: Command) -> StationResult<Reply> {
        let session = self.session;

        match command {
            Command::Empty => Ok(Reply::default()),

            Command::Manual(code) => {
                // Failures were already shown by the emitter
                if let Err(e) = session.intake().submit_manual(&code).await {
                    debug!(error = %e, "Manual entry not queued");
                }
                Ok(Reply::default())
            }

            Command::Scan { code, format } => {
                match session.intake().on_decode(&code, &format).await {
                    Ok(IntakeOutcome::Duplicate) => Ok(Reply::line("  duplicate read ignored")),
                    Ok(IntakeOutcome::Queued(_)) => Ok(Reply::default()),
                    Err(e) => {
                        debug!(error = %e, "Camera read not queued");
                        Ok(Reply::default())
                    }
                }
            }

            Command::Online | Command::Offline => {
                let online = command == Command::Online;
                let event = if online {
                    ConnectivityEvent::Online
                } else {
                    ConnectivityEvent::Offline
                };
                let changed = session.connectivity().apply(event);
                let state = if online { "online" } else { "offline" };
                Ok(Reply::line(if changed {
                    format!("  now {}", state)
                } else {
                    format!("  already {}", state)
                }))
            }

            Command::Sync => {
                session.engine().sync().await;
                Ok(Reply::default())
            }

            Command::List(limit) => {
                let records = match limit {
                    Some(n) => session.inspector().list(n).await?,
                    None => session.inspector().list_page().await?,
                };
                if records.is_empty() {
                    return Ok(Reply::line("  queue is empty"));
                }
                Ok(Reply {
                    lines: records.iter().map(describe_record).collect(),
                    quit: false,
                })
            }

            Command::Status => {
                let status = session.status().await?;
                let mut lines = vec![
                    format!(
                        "  {}{}",
                        if status.online { "online" } else { "offline" },
                        if status.sync_in_flight { ", sync in flight" } else { "" }
                    ),
                    describe_counts(&status.counts),
                ];
                if let Some(at) = status.last_sync_at {
                    lines.push(format!("  last sync: {}", at.format("%Y-%m-%d %H:%M:%S")));
                }
                if let Some(error) = status.last_error {
                    lines.push(format!("  last error: {}", error));
                }
                if let Some(scan) = status.last_scan {
                    lines.push(format!("  last scan: {} [{}]", scan.barcode, scan.barcode_type));
                }
                Ok(Reply { lines, quit: false })
            }

            Command::Clear => {
                let prompt = session.inspector().prepare_clear().await?;
                if prompt.total == 0 {
                    return Ok(Reply::line("  queue is empty"));
                }
                let message = prompt.message();
                self.pending_clear = Some(prompt);
                Ok(Reply::line(format!("  {} Type 'yes' to confirm.", message)))
            }

            Command::Help => Ok(Reply::line(HELP)),

            Command::Quit => Ok(Reply {
                lines: Vec::new(),
                quit: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanq_db::{Database, DbConfig};
    use scanq_sync::{Connectivity, NoOpEmitter, ScanqConfig};
    use std::sync::Arc;

    async fn session() -> ScanSession {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        ScanSession::new(
            &ScanqConfig::default(),
            db,
            None,
            Connectivity::new(false),
            Arc::new(NoOpEmitter),
        )
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Command::parse(" 012345678905 ").unwrap(),
            Command::Manual("012345678905".into())
        );
        assert_eq!(
            Command::parse(":scan 96385074 ean_8").unwrap(),
            Command::Scan {
                code: "96385074".into(),
                format: "ean_8".into()
            }
        );
        assert_eq!(Command::parse(":list 5").unwrap(), Command::List(Some(5)));
        assert_eq!(Command::parse("").unwrap(), Command::Empty);
        assert_eq!(Command::parse(":q").unwrap(), Command::Quit);

        assert!(Command::parse(":list many").is_err());
        assert!(Command::parse(":scan").is_err());
        assert!(Command::parse(":reboot").is_err());
    }

    #[tokio::test]
    async fn test_clear_needs_yes() {
        let session = session().await;
        let mut console = Console::new(&session);

        console.handle("A1").await.unwrap();
        console.handle("A2").await.unwrap();

        let reply = console.handle(":clear").await.unwrap();
        assert!(reply.lines[0].contains("2 have not been synced"));
        let reply = console.handle("no").await.unwrap();
        assert_eq!(reply.lines, vec!["  clear cancelled"]);
        assert_eq!(session.inspector().counts().await.unwrap().total, 2);

        console.handle(":clear").await.unwrap();
        let reply = console.handle("yes").await.unwrap();
        assert_eq!(reply.lines, vec!["  cleared 2 scans"]);
        assert!(session.inspector().counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_and_list() {
        let session = session().await;
        let mut console = Console::new(&session);

        assert!(console.handle(":scan 012345678905").await.unwrap().lines.is_empty());
        let reply = console.handle(":scan 012345678905").await.unwrap();
        assert_eq!(reply.lines, vec!["  duplicate read ignored"]);

        let reply = console.handle(":list").await.unwrap();
        assert_eq!(reply.lines.len(), 1);
        assert!(reply.lines[0].contains("UPC-A"));
    }

    #[tokio::test]
    async fn test_connectivity_and_status() {
        let session = session().await;
        let mut console = Console::new(&session);

        assert_eq!(console.handle(":online").await.unwrap().lines, vec!["  now online"]);
        assert_eq!(console.handle(":online").await.unwrap().lines, vec!["  already online"]);

        // No endpoint configured: the run reports it and nothing changes
        console.handle("A1").await.unwrap();
        console.handle(":sync").await.unwrap();
        let reply = console.handle(":status").await.unwrap();
        assert_eq!(reply.lines[0], "  online");
        assert!(reply.lines.iter().any(|l| l.contains("not configured")));
        assert!(reply.lines.iter().any(|l| l.contains("1 pending")));

        assert!(console.handle(":quit").await.unwrap().quit);
    }
}
