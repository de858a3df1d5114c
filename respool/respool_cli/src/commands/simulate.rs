use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Args;
use respool_core::{log_event, LogLevel, PoolConfig, PoolError};
use respool_pool::{Group, PoolStats};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::load_config;

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to the TOML configuration file
    #[clap(long)]
    pub config: PathBuf,

    /// Number of worker threads
    #[clap(long, default_value_t = 4)]
    pub workers: usize,

    /// Borrow/return cycles per worker
    #[clap(long, default_value_t = 100)]
    pub iterations: usize,

    /// How long each cycle holds its resources, in milliseconds
    #[clap(long, default_value_t = 1)]
    pub hold_ms: u64,

    /// Pools to borrow from on each cycle, in order (default: all)
    #[clap(long, value_delimiter = ',')]
    pub pools: Vec<String>,

    /// Make every K-th factory call of each pool fail
    #[clap(long)]
    pub fail_every: Option<u64>,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Stand-in for a real connection.
#[derive(Debug)]
struct SimulatedConnection {
    serial: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("simulated failure on construction {call} of pool '{pool}'")]
struct SimulatedFailure {
    pool: String,
    call: u64,
}

#[derive(Debug, Default)]
struct Outcomes {
    succeeded: AtomicU64,
    exhausted: AtomicU64,
    connection_failures: AtomicU64,
    other_errors: AtomicU64,
}

impl Outcomes {
    fn record(&self, result: &Result<u64, PoolError>) {
        let counter = match result {
            Ok(_) => &self.succeeded,
            Err(PoolError::Empty { .. }) => &self.exhausted,
            Err(PoolError::Connection { .. }) => &self.connection_failures,
            Err(_) => &self.other_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Result of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub workers: usize,
    pub iterations: usize,
    pub pools: Vec<String>,
    pub elapsed_ms: u128,
    pub succeeded: u64,
    pub exhausted: u64,
    pub connection_failures: u64,
    pub other_errors: u64,
    pub stats: Vec<PoolStats>,
}

fn synthetic_factory(
    config: &PoolConfig,
    fail_every: Option<u64>,
) -> impl Fn() -> Result<SimulatedConnection, SimulatedFailure> + Send + Sync + 'static {
    let pool = config.name.clone();
    let calls = Arc::new(AtomicU64::new(0));

    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if fail_every.is_some_and(|k| call % k == 0) {
            return Err(SimulatedFailure {
                pool: pool.clone(),
                call,
            });
        }
        Ok(SimulatedConnection { serial: call })
    }
}

/// Build a group from the configuration and hammer it from several threads.
pub fn execute_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    if args.workers == 0 {
        bail!("--workers must be at least 1");
    }
    if args.fail_every == Some(0) {
        bail!("--fail-every must be at least 1");
    }

    let config = load_config(&args.config)?;
    let fail_every = args.fail_every;
    let group = Group::from_config(&config, |pool| synthetic_factory(pool, fail_every))
        .context("failed to build pools")?;

    let names = if args.pools.is_empty() {
        group.names()
    } else {
        args.pools.clone()
    };
    if names.is_empty() {
        bail!("no pools to simulate");
    }
    for name in &names {
        if !group.contains(name) {
            bail!("pool '{}' is not defined in {}", name, args.config.display());
        }
    }

    info!(
        "Simulating {} worker(s) x {} iteration(s) over {:?}",
        args.workers, args.iterations, names
    );

    let report = run(&group, &names, args);

    log_event!(LogLevel::Info, "simulation finished",
        succeeded => report.succeeded,
        exhausted => report.exhausted,
        connection_failures => report.connection_failures,
        other_errors => report.other_errors,
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run(group: &Group<SimulatedConnection>, names: &[String], args: &SimulateArgs) -> SimulationReport {
    let outcomes = Outcomes::default();
    let hold = Duration::from_millis(args.hold_ms);
    let start = Instant::now();

    thread::scope(|scope| {
        for worker in 0..args.workers {
            let outcomes = &outcomes;
            scope.spawn(move || {
                for _ in 0..args.iterations {
                    let result: Result<u64, PoolError> = group.with_resources(names, |connections| {
                        thread::sleep(hold);
                        Ok(connections.iter().map(|c| c.serial).sum())
                    });
                    match &result {
                        Err(e) if e.is_transient() => {
                            debug!("Worker {} cycle failed: {}", worker, e);
                        }
                        Err(e) => warn!("Worker {} cycle failed unexpectedly: {}", worker, e),
                        Ok(_) => {}
                    }
                    outcomes.record(&result);
                }
            });
        }
    });

    let elapsed = start.elapsed();
    let leaked = group.reclaim_all();
    if leaked > 0 {
        warn!("Reclaimed {} handle(s) left borrowed after the run", leaked);
    }

    SimulationReport {
        workers: args.workers,
        iterations: args.iterations,
        pools: names.to_vec(),
        elapsed_ms: elapsed.as_millis(),
        succeeded: outcomes.succeeded.load(Ordering::Relaxed),
        exhausted: outcomes.exhausted.load(Ordering::Relaxed),
        connection_failures: outcomes.connection_failures.load(Ordering::Relaxed),
        other_errors: outcomes.other_errors.load(Ordering::Relaxed),
        stats: group.stats(),
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "Simulated {} worker(s) x {} iteration(s) over {} in {}ms",
        report.workers,
        report.iterations,
        report.pools.join(","),
        report.elapsed_ms
    );
    println!("  succeeded:           {}", report.succeeded);
    println!("  exhausted:           {}", report.exhausted);
    println!("  connection failures: {}", report.connection_failures);
    println!("  other errors:        {}", report.other_errors);
    println!();
    println!(
        "{:<16} {:>8} {:>6} {:>6} {:>8} {:>6} {:>8} {:>9} {:>9} {:>10} {:>10}",
        "pool", "capacity", "idle", "ready", "borrowed", "util", "created", "acquired",
        "released", "exhausted", "failures"
    );
    for stats in &report.stats {
        println!(
            "{:<16} {:>8} {:>6} {:>6} {:>8} {:>5.0}% {:>8} {:>9} {:>9} {:>10} {:>10}",
            stats.name,
            stats.capacity,
            stats.idle,
            stats.ready,
            stats.borrowed,
            stats.utilization() * 100.0,
            stats.created,
            stats.acquired,
            stats.released,
            stats.exhausted,
            stats.connection_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_keep_error_kinds_apart() {
        let outcomes = Outcomes::default();
        outcomes.record(&Ok(3));
        outcomes.record(&Err(PoolError::Empty {
            pool: "db".into(),
            capacity: 1,
        }));
        outcomes.record(&Err(PoolError::Connection {
            pool: "db".into(),
            attempts: 2,
            source: "refused".into(),
        }));
        outcomes.record(&Err(PoolError::NotFound("ghost".into())));

        assert_eq!(outcomes.succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(outcomes.exhausted.load(Ordering::Relaxed), 1);
        assert_eq!(outcomes.connection_failures.load(Ordering::Relaxed), 1);
        assert_eq!(outcomes.other_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_synthetic_factory_fails_every_kth_call() {
        let factory = synthetic_factory(&PoolConfig::new("db", 1), Some(2));
        assert!(factory().is_ok());
        let err = factory().unwrap_err();
        assert_eq!(err.call, 2);
        assert!(factory().is_ok());
    }
}
