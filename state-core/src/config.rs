//! State engine configuration

use crate::{Result, StateError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Roughly a century; keeps the chrono duration in range.
const MAX_RETENTION_MINUTES: u64 = 60 * 24 * 365 * 100;

/// State engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Capacity of each per-kind ingestion queue
    pub channel_capacity: usize,
    /// Age in minutes after which an interval bucket is evicted
    pub retention_minutes: u64,
    /// Delay between eviction sweeps in seconds
    pub sweep_interval_secs: u64,
    /// A store is only scanned when it holds more keys than this
    pub sweep_min_keys: usize,
    /// Paths under this prefix are not counted as requests or status codes
    pub reserved_prefix: String,
    /// Event record pooling
    pub pool: PoolConfig,
}

/// Event record pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Reuse event records instead of allocating one per event
    pub enabled: bool,
    /// Maximum idle records kept per event kind
    pub max_idle: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            retention_minutes: 60,
            sweep_interval_secs: 600,
            sweep_min_keys: 10,
            reserved_prefix: "/pulsestate/".to_string(),
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_idle: 1024,
        }
    }
}

impl StateConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Rejected state configuration");
        })
    }

    /// Check that every setting can drive a running engine
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(StateError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.retention_minutes == 0 {
            return Err(StateError::Config(
                "retention_minutes must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(StateError::Config(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.reserved_prefix.is_empty() {
            return Err(StateError::Config(
                "reserved_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retention_minutes.min(MAX_RETENTION_MINUTES) as i64)
    }

    /// Whether a request path belongs to the self-monitoring namespace
    pub fn is_reserved(&self, page: &str) -> bool {
        page.starts_with(&self.reserved_prefix)
    }
}
