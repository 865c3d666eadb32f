use anyhow::{Context, Result};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::sensors::HOME_CATEGORY;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

/// Maximum adapter timeout, a query blocks the refresh loop for this long
pub const MAX_ADAPTER_TIMEOUT_MS: u64 = 5000;

/// Minimum adapter timeout, sockets reject a zero timeout
pub const MIN_ADAPTER_TIMEOUT_MS: u64 = 100;

/// Fastest allowed refresh
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// OBD2 adapter link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Serial device or `host:port`. `None` tries the usual candidates.
    #[serde(default = "default_port")]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[allow(clippy::unnecessary_wraps)] // serde default for an Option field
fn default_port() -> Option<String> {
    Some("/dev/ttyUSB0".to_string())
}

const fn default_baud_rate() -> u32 {
    obdash_elm327_lib::client::DEFAULT_BAUD_RATE
}

const fn default_timeout_ms() -> u64 {
    2000
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Category shown at startup
    #[serde(default = "default_category")]
    pub default_category: String,
    /// Seed for mock data, 0 picks a random one
    #[serde(default)]
    pub mock_seed: u64,
}

const fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_category() -> String {
    HOME_CATEGORY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            log_level: LogLevel::default(),
            refresh_interval_ms: default_refresh_interval_ms(),
            default_category: default_category(),
            mock_seed: 0,
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values
    pub fn validate(&mut self) {
        if self.adapter.timeout_ms > MAX_ADAPTER_TIMEOUT_MS {
            warn!(
                "Clamping adapter.timeout_ms from {} to {MAX_ADAPTER_TIMEOUT_MS}",
                self.adapter.timeout_ms
            );
            self.adapter.timeout_ms = MAX_ADAPTER_TIMEOUT_MS;
        }
        if self.adapter.timeout_ms < MIN_ADAPTER_TIMEOUT_MS {
            warn!(
                "Clamping adapter.timeout_ms from {} to {MIN_ADAPTER_TIMEOUT_MS}",
                self.adapter.timeout_ms
            );
            self.adapter.timeout_ms = MIN_ADAPTER_TIMEOUT_MS;
        }
        if self.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            warn!(
                "Clamping refresh_interval_ms from {} to {MIN_REFRESH_INTERVAL_MS}",
                self.refresh_interval_ms
            );
            self.refresh_interval_ms = MIN_REFRESH_INTERVAL_MS;
        }
        if self.adapter.port.as_deref().is_some_and(str::is_empty) {
            warn!("Adapter port is empty, trying all candidates");
            self.adapter.port = None;
        }
        if self.default_category.is_empty() {
            warn!("Default category is empty, resetting to {HOME_CATEGORY}");
            self.default_category = default_category();
        }
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config from {}: {e:#}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let json = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut config: Self = serde_json::from_slice(&json).context("parsing config")?;
        debug!(
            "Config parsed: port={:?}, log_level={:?}, category={}",
            config.adapter.port, config.log_level, config.default_category
        );
        config.validate();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving config to {}", path.display());
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("Config saved to {}", path.display());
        Ok(())
    }

    #[must_use]
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter.timeout_ms)
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
