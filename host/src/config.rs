//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Where the query/ingest http api listens.
//!     - IngestConfig: Gateway tcp listener, frame separator and size cap.
//!     - StorageConfig: Snapshot log path and flush interval.
//!     - LiveConfig: Live-push channel sizing.
//!     - LoggingConfig: Log level and frame echo.
//!
//! every section may be omitted, missing keys take the defaults below.
//!
//! ==============================================================================

use crate::assembler::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_SEPARATOR};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub enabled: bool,
    pub bind: String,
    /// line that terminates a frame on the gateway stream
    pub separator: String,
    /// frames (and single lines) longer than this are dropped
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub log_path: PathBuf,
    pub flush_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveConfig {
    /// how far a slow live subscriber may lag before it skips snapshots
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// echo every assembled frame and merged snapshot
    pub show_frames: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:4000".to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("datos_sensores.txt"),
            flush_interval_seconds: 60,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { channel_capacity: 64 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_frames: false }
    }
}

impl StorageConfig {
    /// flush period, never shorter than one second
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds.max(1))
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    ///
    /// runs before the logger exists, so it reports on stdout like the banner.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│            HUB CONFIGURATION            │");
        println!("├─────────────────────────────────────────┤");
        println!("│ HTTP: {}", self.server.bind);
        if self.ingest.enabled {
            println!(
                "│ Gateway ingest: {} (frames up to {} bytes)",
                self.ingest.bind, self.ingest.max_frame_bytes
            );
        } else {
            println!("│ Gateway ingest: disabled");
        }
        println!("│ Log file: {}", self.storage.log_path.display());
        println!("│ Flush interval: {}s", self.storage.flush_interval_seconds);
        println!("│ Log level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
