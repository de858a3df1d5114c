use clap::{Parser, Subcommand};
use respool_core::LogLevel;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::check::{execute_check, CheckArgs};
use commands::simulate::{execute_simulate, SimulateArgs};

/// respool command line interface
///
/// Validates pool configuration files and runs borrow/return simulations
/// against them.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[clap(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a configuration file
    Check(CheckArgs),

    /// Drive the configured pools from several threads and report statistics
    Simulate(SimulateArgs),
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Library crates log through `log`; the fmt subscriber picks those
    // records up as well.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Commands::Check(args) => execute_check(&args),
        Commands::Simulate(args) => execute_simulate(&args),
    }
}
