//! Subcommand implementations

/// Configuration validation
pub mod check;

/// Multi-threaded pool simulation
pub mod simulate;

use std::path::Path;

use anyhow::Context;
use respool_core::GroupConfig;

/// Load a configuration file, attaching the path to any error.
pub fn load_config(path: &Path) -> anyhow::Result<GroupConfig> {
    GroupConfig::load(path)
        .with_context(|| format!("invalid pool configuration in {}", path.display()))
}
