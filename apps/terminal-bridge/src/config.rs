//! Configuration for the bridge.
//!
//! Loaded from YAML with per-field defaults, so an empty file (or no file)
//! yields the observed reference behavior: 5s reconciliation cadence and a
//! 5-poll, 1s-cadence verification loop.
//!
//! # Usage
//!
//! ```rust,ignore
//! use terminal_bridge::config::load_config;
//!
//! // Load from default path (bridge.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/bridge.yaml"))?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broker::retry::VerifyRetryPolicy;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "bridge.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Position synchronizer configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Verify-after-create configuration.
    #[serde(default)]
    pub verify: VerifyConfig,
    /// Symbol resolution configuration.
    #[serde(default)]
    pub symbols: SymbolConfig,
}

impl BridgeConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sync.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.verify.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "verify.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.verify.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "verify.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.verify.jitter_factor) {
            return Err(ConfigError::ValidationError(
                "verify.jitter_factor must be in [0.0, 1.0)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Position synchronizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between timer-driven reconciliation passes.
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

impl SyncConfig {
    /// Interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval_secs(),
        }
    }
}

/// Verify-after-create configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Cache polls before the submission is declared lost.
    #[serde(default = "default_verify_attempts")]
    pub max_attempts: u32,
    /// Pause before the second poll, in milliseconds.
    #[serde(default = "default_verify_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap on any single pause, in milliseconds.
    #[serde(default = "default_verify_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor between pauses; 1.0 keeps a fixed cadence.
    #[serde(default = "default_verify_multiplier")]
    pub backoff_multiplier: f64,
    /// Randomization factor, 0.0..1.0.
    #[serde(default)]
    pub jitter_factor: f64,
}

impl VerifyConfig {
    /// Build the retry policy this configuration describes.
    #[must_use]
    pub const fn policy(&self) -> VerifyRetryPolicy {
        VerifyRetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_verify_attempts(),
            initial_backoff_ms: default_verify_backoff_ms(),
            max_backoff_ms: default_verify_max_backoff_ms(),
            backoff_multiplier: default_verify_multiplier(),
            jitter_factor: 0.0,
        }
    }
}

/// Symbol resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Venue-specific suffix probed after the bare variants.
    #[serde(default = "default_venue_suffix")]
    pub venue_suffix: String,
    /// Cache successful resolutions for the life of the process.
    #[serde(default = "default_true")]
    pub cache_resolutions: bool,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            venue_suffix: default_venue_suffix(),
            cache_resolutions: true,
        }
    }
}

const fn default_sync_interval_secs() -> u64 {
    5
}
const fn default_verify_attempts() -> u32 {
    5
}
const fn default_verify_backoff_ms() -> u64 {
    1000
}
const fn default_verify_max_backoff_ms() -> u64 {
    5000
}
const fn default_verify_multiplier() -> f64 {
    1.0
}
fn default_venue_suffix() -> String {
    "m".to_string()
}
const fn default_true() -> bool {
    true
}

/// Load configuration from a YAML file.
///
/// With `path == None` the default path is used, and a missing default file
/// falls back to the built-in defaults rather than failing.
pub fn load_config(path: Option<&str>) -> Result<BridgeConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (DEFAULT_CONFIG_PATH, false),
    };

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(source) if !required && source.kind() == std::io::ErrorKind::NotFound => {
            let config = BridgeConfig::default();
            config.validate()?;
            return Ok(config);
        }
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_string(),
                source,
            });
        }
    };

    let config: BridgeConfig = serde_yaml_bw::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
