use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use super::load_config;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Path to the TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
}

/// Validate the configuration and print the resolved settings of each pool.
pub fn execute_check(args: &CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let pools = config.resolved();
    debug!("Resolved {} pool(s)", pools.len());

    for pool in &pools {
        println!(
            "{}: capacity={} retry={}x{}ms reconnect={}x{}ms",
            pool.name,
            pool.capacity,
            pool.retry.attempts,
            pool.retry.delay.as_millis(),
            pool.reconnect.attempts,
            pool.reconnect.delay.as_millis()
        );
    }
    println!("Configuration OK: {} pool(s)", pools.len());
    Ok(())
}
