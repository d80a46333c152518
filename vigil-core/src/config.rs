//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/vigil/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/vigil/` (~/.config/vigil/)
//! - Data: `$XDG_DATA_HOME/vigil/` (~/.local/share/vigil/)
//! - State/Logs: `$XDG_STATE_HOME/vigil/` (~/.local/state/vigil/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Transcript scanning bounds
    #[serde(default)]
    pub scan: ScanConfig,

    /// Token pricing rates
    #[serde(default)]
    pub pricing: PricingRates,

    /// Telemetry store maintenance
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bounds for partial transcript scans.
///
/// These are a precision/performance trade-off, not a correctness guarantee:
/// a first user message past `first_message_lines` or a timestamp past the
/// head/tail windows is simply not observed. Message counts and token sums
/// always cover the whole file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScanConfig {
    /// Scan at most this many leading lines for the first user message
    #[serde(default = "default_first_message_lines")]
    pub first_message_lines: usize,

    /// Scan at most this many leading lines for the earliest timestamp
    #[serde(default = "default_head_timestamp_lines")]
    pub head_timestamp_lines: usize,

    /// Scan at most this many trailing lines for the latest timestamp
    #[serde(default = "default_tail_timestamp_lines")]
    pub tail_timestamp_lines: usize,

    /// Truncate the first-message preview to this many characters
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            first_message_lines: default_first_message_lines(),
            head_timestamp_lines: default_head_timestamp_lines(),
            tail_timestamp_lines: default_tail_timestamp_lines(),
            preview_length: default_preview_length(),
        }
    }
}

fn default_first_message_lines() -> usize {
    20
}

fn default_head_timestamp_lines() -> usize {
    20
}

fn default_tail_timestamp_lines() -> usize {
    50
}

fn default_preview_length() -> usize {
    200
}

/// Dollars-per-million-token rates used for cost derivation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PricingRates {
    #[serde(default = "default_input_rate")]
    pub input_per_million: f64,

    #[serde(default = "default_output_rate")]
    pub output_per_million: f64,

    #[serde(default = "default_cache_read_rate")]
    pub cache_read_per_million: f64,

    #[serde(default = "default_cache_creation_rate")]
    pub cache_creation_per_million: f64,
}

impl PricingRates {
    /// Dollar cost of a batch of tokens at these rates.
    pub fn cost_usd(&self, tokens: &crate::types::TokenCounts) -> f64 {
        tokens.input_tokens as f64 * self.input_per_million / 1_000_000.0
            + tokens.output_tokens as f64 * self.output_per_million / 1_000_000.0
            + tokens.cache_read_tokens as f64 * self.cache_read_per_million / 1_000_000.0
            + tokens.cache_creation_tokens as f64 * self.cache_creation_per_million / 1_000_000.0
    }
}

impl Default for PricingRates {
    fn default() -> Self {
        Self {
            input_per_million: default_input_rate(),
            output_per_million: default_output_rate(),
            cache_read_per_million: default_cache_read_rate(),
            cache_creation_per_million: default_cache_creation_rate(),
        }
    }
}

fn default_input_rate() -> f64 {
    3.0
}

fn default_output_rate() -> f64 {
    15.0
}

fn default_cache_read_rate() -> f64 {
    0.3
}

fn default_cache_creation_rate() -> f64 {
    3.75
}

/// Telemetry store maintenance configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MaintenanceConfig {
    /// Days between vacuum passes over the store file
    #[serde(default = "default_vacuum_interval_days")]
    pub vacuum_interval_days: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            vacuum_interval_days: default_vacuum_interval_days(),
        }
    }
}

fn default_vacuum_interval_days() -> u64 {
    7
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/vigil/config.toml` (~/.config/vigil/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("vigil").join("config.toml")
    }

    /// Returns the data directory path (for the telemetry store)
    ///
    /// `$XDG_DATA_HOME/vigil/` (~/.local/share/vigil/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("vigil")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/vigil/` (~/.local/state/vigil/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("vigil")
    }

    /// Returns the telemetry store file path
    ///
    /// `$XDG_DATA_HOME/vigil/telemetry.db` (~/.local/share/vigil/telemetry.db)
    pub fn store_path() -> PathBuf {
        Self::data_dir().join("telemetry.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/vigil/vigil.log` (~/.local/state/vigil/vigil.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("vigil.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.first_message_lines, 20);
        assert_eq!(config.scan.preview_length, 200);
        assert_eq!(config.maintenance.vacuum_interval_days, 7);
        assert_eq!(config.pricing.input_per_million, 3.0);
        assert_eq!(config.pricing.cache_creation_per_million, 3.75);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[scan]
first_message_lines = 5
tail_timestamp_lines = 10

[pricing]
input_per_million = 1.5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.scan.first_message_lines, 5);
        assert_eq!(config.scan.tail_timestamp_lines, 10);
        // Unspecified fields fall back to defaults
        assert_eq!(config.scan.head_timestamp_lines, 20);
        assert_eq!(config.pricing.input_per_million, 1.5);
        assert_eq!(config.pricing.output_per_million, 15.0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_rates_cost_one_million_each() {
        let tokens = crate::types::TokenCounts {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
            cache_read_tokens: 1_000_000,
            cache_creation_tokens: 1_000_000,
        };
        let cost = PricingRates::default().cost_usd(&tokens);
        assert!((cost - 22.05).abs() < 1e-9);
    }
}
