//! Error types for the respool resource pool.
//!
//! `PoolError` is the single error type surfaced by pools, handles and
//! groups. Configuration problems have their own `ConfigError`, which
//! converts into `PoolError` so callers building pools from a file only
//! deal with one type.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error produced by a resource factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used throughout respool.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors raised by pools, handles and groups.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No slot became free within the wait budget
    #[error("Pool '{pool}' is empty (size {capacity})")]
    Empty {
        /// Name of the exhausted pool
        pool: String,

        /// Capacity of the exhausted pool
        capacity: usize,
    },

    /// The factory kept failing until the reconnect budget ran out
    #[error("Pool '{pool}' failed to create a resource after {attempts} attempt(s): {source}")]
    Connection {
        /// Name of the pool whose factory failed
        pool: String,

        /// Number of factory calls made
        attempts: u32,

        /// The last factory failure
        #[source]
        source: BoxError,
    },

    /// A handle convenience call was made on a handle without a pool
    #[error("Handle is not associated with a pool")]
    NoOwner,

    /// A group lookup named a pool that is not registered
    #[error("Pool '{0}' not found")]
    NotFound(String),

    /// A group operation was called with arguments it cannot act on
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// The handle is not currently borrowed from this pool
    #[error("Handle {id} is not borrowed from pool '{pool}'")]
    NotBorrowed {
        /// Name of the pool the handle was returned to
        pool: String,

        /// Identifier of the returned handle, or `<unassigned>`
        id: String,
    },

    /// Pool or group configuration is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PoolError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Exhaustion and factory failures depend on pool state; everything
    /// else is a programming or configuration mistake.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Empty { .. } | Self::Connection { .. })
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was being read
        path: PathBuf,

        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for the expected schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but violates a constraint
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
