//! Pool and group configuration.
//!
//! Configuration is written in TOML. A file holds an optional `[defaults]`
//! table and a list of `[[pools]]`; any tunable a pool leaves out is taken
//! from the defaults, and any default left out falls back to the built-in
//! values (3 attempts, 1000ms delay, matching [`RetryPolicy::default`]).
//!
//! ```
//! use respool_core::config::GroupConfig;
//!
//! let config = GroupConfig::from_toml_str(r#"
//!     [defaults]
//!     retry_delay_ms = 25
//!
//!     [[pools]]
//!     name = "primary"
//!     capacity = 4
//! "#).unwrap();
//!
//! let pool = &config.resolved()[0];
//! assert_eq!(pool.capacity, 4);
//! assert_eq!(pool.retry.delay.as_millis(), 25);
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

/// Attempt bound and fixed delay for one backoff loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, at least 1
    pub attempts: u32,

    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy, clamping `attempts` to at least one.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Total time spent sleeping when every attempt fails.
    ///
    /// There is no delay after the last attempt, so this is
    /// `(attempts - 1) * delay`.
    pub fn budget(&self) -> Duration {
        self.delay.saturating_mul(self.attempts.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: Duration::from_millis(default_delay_ms()),
        }
    }
}

/// Tunables shared by every pool unless overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDefaults {
    /// Attempts to find a free slot
    #[serde(default = "default_attempts")]
    pub retry_attempts: u32,

    /// Delay between slot attempts (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub retry_delay_ms: u64,

    /// Attempts to construct a resource
    #[serde(default = "default_attempts")]
    pub reconnect_attempts: u32,

    /// Delay between construction attempts (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            retry_attempts: default_attempts(),
            retry_delay_ms: default_delay_ms(),
            reconnect_attempts: default_attempts(),
            reconnect_delay_ms: default_delay_ms(),
        }
    }
}

/// One `[[pools]]` entry as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Pool name, unique within the file
    pub name: String,

    /// Number of resources the pool may hold
    pub capacity: usize,

    /// Overrides `defaults.retry_attempts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,

    /// Overrides `defaults.retry_delay_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    /// Overrides `defaults.reconnect_attempts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_attempts: Option<u32>,

    /// Overrides `defaults.reconnect_delay_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,
}

/// Fully resolved settings for a single pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool name
    pub name: String,

    /// Fixed capacity
    pub capacity: usize,

    /// Backoff while waiting for a free slot
    pub retry: RetryPolicy,

    /// Backoff while the factory is failing
    pub reconnect: RetryPolicy,
}

impl PoolConfig {
    /// Settings for `name` with the built-in tunables.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            retry: RetryPolicy::default(),
            reconnect: RetryPolicy::default(),
        }
    }

    /// Replace the slot-wait backoff.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy::new(attempts, delay);
        self
    }

    /// Replace the construction backoff.
    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect = RetryPolicy::new(attempts, delay);
        self
    }

    /// Check the constraints a pool needs at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pool name cannot be empty".into()));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(format!(
                "pool '{}' must have a positive capacity",
                self.name
            )));
        }
        if self.retry.attempts == 0 || self.reconnect.attempts == 0 {
            return Err(ConfigError::Invalid(format!(
                "pool '{}' needs at least one attempt",
                self.name
            )));
        }
        Ok(())
    }
}

/// A whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Defaults applied to every entry
    #[serde(default)]
    pub defaults: PoolDefaults,

    /// Pool entries, in registration order
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
}

impl GroupConfig {
    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GroupConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading pool configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&content)?;
        debug!("Loaded {} pool definition(s)", config.pools.len());
        Ok(config)
    }

    /// Apply defaults to every entry.
    pub fn resolved(&self) -> Vec<PoolConfig> {
        self.pools
            .iter()
            .map(|entry| PoolConfig {
                name: entry.name.clone(),
                capacity: entry.capacity,
                retry: RetryPolicy {
                    attempts: entry.retry_attempts.unwrap_or(self.defaults.retry_attempts),
                    delay: Duration::from_millis(
                        entry.retry_delay_ms.unwrap_or(self.defaults.retry_delay_ms),
                    ),
                },
                reconnect: RetryPolicy {
                    attempts: entry
                        .reconnect_attempts
                        .unwrap_or(self.defaults.reconnect_attempts),
                    delay: Duration::from_millis(
                        entry
                            .reconnect_delay_ms
                            .unwrap_or(self.defaults.reconnect_delay_ms),
                    ),
                },
            })
            .collect()
    }

    /// Validate every resolved entry and reject duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for pool in self.resolved() {
            pool.validate()?;
            if !seen.insert(pool.name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "pool '{}' is defined more than once",
                    pool.name
                )));
            }
        }
        Ok(())
    }
}
