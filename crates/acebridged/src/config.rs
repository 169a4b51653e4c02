//! Configuration management for acebridged.
//!
//! Loads settings from /etc/acebridge/config.toml or uses defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/acebridge/config.toml";

/// Fallback config file path
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/acebridge/config.toml";

/// SHDR adapter (agent-facing) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Address the adapter listens on
    #[serde(default = "default_adapter_host")]
    pub host: String,

    /// Port agents connect to
    #[serde(default = "default_adapter_port")]
    pub port: u16,

    /// Heartbeat interval advertised in PONG replies, in milliseconds
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

fn default_adapter_host() -> String {
    "127.0.0.1".to_string()
}

fn default_adapter_port() -> u16 {
    7878
}

fn default_heartbeat_ms() -> u64 {
    10_000
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: default_adapter_host(),
            port: default_adapter_port(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

impl AdapterConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// Printer (Moonraker API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Printer host name or IP address
    #[serde(default = "default_printer_host")]
    pub host: String,

    /// Moonraker API port
    #[serde(default = "default_printer_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_printer_timeout")]
    pub timeout_secs: u64,
}

fn default_printer_host() -> String {
    "192.168.1.56".to_string()
}

fn default_printer_port() -> u16 {
    7125
}

fn default_printer_timeout() -> u64 {
    5
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            host: default_printer_host(),
            port: default_printer_port(),
            timeout_secs: default_printer_timeout(),
        }
    }
}

impl PrinterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Period between cycle starts, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub adapter: AdapterConfig,

    #[serde(default)]
    pub printer: PrinterConfig,

    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {:#}", e);
                Config::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
