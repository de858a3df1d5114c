//! Utility types shared by the respool crates.

pub mod logging;

pub use logging::LogLevel;
