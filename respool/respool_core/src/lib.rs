//! # respool core
//!
//! Shared building blocks for the respool resource pool:
//!
//! - **error**: `PoolError`, `ConfigError` and the `Result` alias
//! - **id**: `HandleId`, the identifier a handle receives on first checkout
//! - **config**: pool/group configuration, loaded from TOML
//! - **utils**: log-level handling
//! - **macros**: `log_event!` for structured log lines

pub mod config;
pub mod error;
pub mod id;
pub mod macros;
pub mod utils;

#[doc(hidden)]
pub use log as __log;

pub use config::{GroupConfig, PoolConfig, PoolDefaults, PoolEntry, RetryPolicy};
pub use error::{BoxError, ConfigError, PoolError, Result};
pub use id::HandleId;
pub use utils::LogLevel;
