//! Logging utilities.
//!
//! The library crates log through the `log` facade. `LogLevel` is the
//! user-facing level name accepted by the CLI and configuration, and maps
//! onto `log::LevelFilter` for the installed backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log level, ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Slot-level traffic: every pop, push and telemetry snapshot.
    Trace,

    /// Construction, reuse and release of individual handles.
    Debug,

    /// Registration and bulk operations.
    Info,

    /// Factory failures and clamped tunables.
    Warning,

    /// Errors only.
    Error,
}

impl LogLevel {
    /// Name of this level as accepted by `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    /// The equivalent `log` filter.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }

    /// Check if this log level is at least as severe as `level`.
    pub fn is_at_least(&self, level: LogLevel) -> bool {
        *self >= level
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}' (expected trace, debug, info, warn or error)")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Case-insensitive; accepts `warning`/`warn` and `error`/`err`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
