//! # Station Configuration
//!
//! Configuration for intake, sync and storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SCANQ_ENDPOINT_URL=https://inventory.example.com/scans             │
//! │     SCANQ_DEVICE_ID=abc-123                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanq/scanq.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.scanq.station/scanq.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device id, no endpoint, 2 s dedup window            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Dock 3"
//!
//! [sync]
//! endpoint_url = "https://inventory.example.com/api/scans"
//! request_timeout_ms = 15000
//! batch_delay_ms = 1500
//!
//! [intake]
//! dedup_window_ms = 2000
//!
//! [database]
//! max_records = 50000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use scanq_core::validation::validate_page_size;
use scanq_core::{DEFAULT_DEDUP_WINDOW_MS, DEFAULT_PAGE_SIZE, MAX_BARCODE_LEN, MAX_PAGE_SIZE};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this station, sent with every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    #[serde(default = "generate_device_id")]
    pub id: String,

    /// Human-readable device name (e.g., "Dock 3").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn generate_device_id() -> String {
    Uuid::new_v4().to_string()
}
fn default_device_name() -> String {
    "Scan Station".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: generate_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Remote endpoint and timing of sync runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Inventory endpoint receiving the batch POST.
    /// Sync runs report `NotConfigured` until this is set.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Bearer token supplied by the shared transport layer.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Bounded wait for one batch transmit (milliseconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// TCP connect timeout (milliseconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Delay between a queued scan and the opportunistic sync it requests,
    /// so closely spaced scans share one batch (milliseconds).
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    15_000
}
fn default_connect_timeout() -> u64 {
    5_000
}
fn default_batch_delay() -> u64 {
    1_500
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            endpoint_url: None,
            auth_token: None,
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            batch_delay_ms: default_batch_delay(),
        }
    }
}

// =============================================================================
// Intake Settings
// =============================================================================

/// Scan Intake behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSettings {
    /// Window in which an identical camera read is discarded (milliseconds).
    /// 0 disables de-duplication.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,

    /// Longest accepted barcode.
    #[serde(default = "default_max_barcode_len")]
    pub max_barcode_len: usize,
}

fn default_dedup_window() -> u64 {
    DEFAULT_DEDUP_WINDOW_MS
}
fn default_max_barcode_len() -> usize {
    MAX_BARCODE_LEN
}

impl Default for IntakeSettings {
    fn default() -> Self {
        IntakeSettings {
            dedup_window_ms: default_dedup_window(),
            max_barcode_len: default_max_barcode_len(),
        }
    }
}

// =============================================================================
// Queue / Database Settings
// =============================================================================

/// Queue Inspector paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Local store location and capacity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `scanq.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Optional queue capacity. Inserts past it are refused, never evicted.
    #[serde(default)]
    pub max_records: Option<u64>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete station configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanqConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub intake: IntakeSettings,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl ScanqConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanq.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config, writing the defaults first when no file exists yet.
    ///
    /// The generated device ID only survives a restart once it is on disk.
    /// A failed write is logged and the station runs on the defaults.
    pub fn load_or_init(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let path = config_path.or_else(Self::default_config_path);

        match path {
            Some(ref path) if !path.exists() => {
                if let Err(e) = Self::default().save(Some(path.clone())) {
                    warn!(
                        ?path,
                        error = %e,
                        "Could not write default config, device ID will change on restart"
                    );
                }
            }
            Some(_) => {}
            None => warn!("No config directory available, device ID will change on restart"),
        }

        Self::load(path)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(ref raw) = self.sync.endpoint_url {
            let url = Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Endpoint URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.sync.request_timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.intake.max_barcode_len == 0 {
            return Err(SyncError::InvalidConfig(
                "max_barcode_len must be greater than 0".into(),
            ));
        }

        validate_page_size("max_page_size", self.queue.max_page_size, MAX_PAGE_SIZE)
            .and_then(|_| {
                validate_page_size("page_size", self.queue.page_size, self.queue.max_page_size)
            })
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        if self.database.max_records == Some(0) {
            return Err(SyncError::InvalidConfig(
                "max_records must be greater than 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the environment in production).
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("SCANQ_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("SCANQ_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("SCANQ_ENDPOINT_URL") {
            debug!(url = %url, "Overriding endpoint URL from environment");
            self.sync.endpoint_url = Some(url);
        }

        if let Some(token) = lookup("SCANQ_AUTH_TOKEN") {
            self.sync.auth_token = Some(token);
        }

        if let Some(path) = lookup("SCANQ_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        let numeric = [
            ("SCANQ_DEDUP_WINDOW_MS", &mut self.intake.dedup_window_ms),
            ("SCANQ_BATCH_DELAY_MS", &mut self.sync.batch_delay_ms),
            ("SCANQ_REQUEST_TIMEOUT_MS", &mut self.sync.request_timeout_ms),
        ];
        for (key, slot) in numeric {
            if let Some(raw) = lookup(key) {
                match raw.parse::<u64>() {
                    Ok(value) => *slot = value,
                    Err(_) => warn!(key, value = %raw, "Ignoring non-numeric override"),
                }
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "scanq", "station")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("scanq.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the endpoint URL if configured.
    pub fn endpoint_url(&self) -> Option<&str> {
        self.sync.endpoint_url.as_deref()
    }

    /// Database file: configured path, else the platform data directory,
    /// else `scanq.db` in the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("scanq.db")))
            .unwrap_or_else(|| PathBuf::from("scanq.db"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.connect_timeout_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.sync.batch_delay_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.intake.dedup_window_ms)
    }
}
