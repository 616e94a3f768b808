//! cas-stress: CLI for stressing or simulating the lock-free collections.
//!
//! # Usage
//!
//! ```bash
//! cas-stress --structure queue --mode stress --producers 30 --producer-threads 10 --consumers 10
//! cas-stress --structure stack --mode dst --seed 42 --dst-iterations 5000
//! ```
//!
//! Outputs a JSON report to stdout. Exits with status 1 when the report
//! is unbalanced or an invariant is violated, 2 on harness errors.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tracing::error;

use cas_collections::{ConcurrentCollection, LockFreeQueue, LockFreeStack};
use cas_dst::{
    get_or_generate_seed, init_logging, run_dst_scenario_with, run_stress, DeterministicRng,
    DstOp, FaultConfig, StressConfig,
};

/// Maximum drain timeout (seconds).
const TIMEOUT_SECONDS_MAX: u64 = 3600;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Structure {
    Queue,
    Stack,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Multi-threaded producers and consumers
    Stress,
    /// Single-threaded deterministic simulation with fault injection
    Dst,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Faults {
    None,
    Default,
    Aggressive,
}

/// Stress or simulate a lock-free collection and print a JSON report.
#[derive(Parser, Debug)]
#[command(name = "cas-stress")]
#[command(about = "Stress and DST runner for the lock-free queue and stack")]
struct Cli {
    /// Collection under test.
    #[arg(long, value_enum, default_value_t = Structure::Queue)]
    structure: Structure,

    #[arg(long, value_enum, default_value_t = Mode::Stress)]
    mode: Mode,

    /// Producer tasks, each inserting `0..items`.
    #[arg(long, default_value_t = 1)]
    producers: usize,

    /// Threads the producer tasks are spread over.
    #[arg(long, default_value_t = 1)]
    producer_threads: usize,

    /// Consumer threads.
    #[arg(long, default_value_t = 1)]
    consumers: usize,

    /// Items per producer task.
    #[arg(long, default_value_t = 10_000)]
    items: u64,

    /// Elements inserted before the workers start.
    #[arg(long, default_value_t = 0)]
    preload: u64,

    /// Value of every preloaded element.
    #[arg(long, default_value_t = 1)]
    preload_value: u64,

    /// Drain timeout in seconds.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=TIMEOUT_SECONDS_MAX))]
    timeout_secs: u64,

    /// DST seed (from `DST_SEED` or random if not set).
    #[arg(long)]
    seed: Option<u64>,

    /// Number of DST operations.
    #[arg(long, default_value_t = 1000)]
    dst_iterations: usize,

    /// Fault profile for DST mode.
    #[arg(long, value_enum, default_value_t = Faults::Default)]
    faults: Faults,
}

impl Cli {
    fn stress_config(&self) -> StressConfig {
        StressConfig {
            producer_tasks: self.producers,
            producer_threads: self.producer_threads,
            consumer_threads: self.consumers,
            items_per_producer: self.items,
            preload_count: self.preload,
            preload_value: self.preload_value,
            drain_timeout: Duration::from_secs(self.timeout_secs),
            ..StressConfig::producer_consumer()
        }
    }

    fn fault_config(&self) -> FaultConfig {
        match self.faults {
            Faults::None => FaultConfig::none(),
            Faults::Default => FaultConfig::default(),
            Faults::Aggressive => FaultConfig::aggressive(),
        }
    }
}

fn stress<C>(collection: C, config: &StressConfig) -> (Value, i32)
where
    C: ConcurrentCollection<u64> + 'static,
{
    match run_stress(Arc::new(collection), config) {
        Ok(report) => {
            let code = if report.is_balanced() { 0 } else { 1 };
            (json!({ "mode": "stress", "passed": code == 0, "report": report }), code)
        }
        Err(e) => {
            error!(error = %e, "stress run failed");
            (json!({ "mode": "stress", "passed": false, "error": e.to_string() }), 2)
        }
    }
}

fn dst<C>(cli: &Cli) -> (Value, i32)
where
    C: ConcurrentCollection<u64> + Default,
{
    let seed = cli.seed.unwrap_or_else(get_or_generate_seed);
    let mut rng = DeterministicRng::new(seed);
    let ops = DstOp::random_sequence(&mut rng, cli.dst_iterations);
    let result = run_dst_scenario_with::<C>(seed, cli.fault_config(), ops);
    if !result.passed {
        error!("{}", result.format());
    }
    let code = if result.passed { 0 } else { 1 };
    (json!({ "mode": "dst", "passed": result.passed, "result": result }), code)
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let (output, code) = match (cli.mode, cli.structure) {
        (Mode::Stress, Structure::Queue) => stress(LockFreeQueue::<u64>::new(), &cli.stress_config()),
        (Mode::Stress, Structure::Stack) => stress(LockFreeStack::<u64>::new(), &cli.stress_config()),
        (Mode::Dst, Structure::Queue) => dst::<LockFreeQueue<u64>>(&cli),
        (Mode::Dst, Structure::Stack) => dst::<LockFreeStack<u64>>(&cli),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: failed to serialize report: {e}");
            process::exit(2);
        }
    }
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_must_be_positive() {
        let err = Cli::try_parse_from(["cas-stress", "--timeout-secs", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(Cli::try_parse_from(["cas-stress", "--timeout-secs", "3601"]).is_err());
    }

    #[test]
    fn test_stress_config_from_flags() {
        let cli = Cli::try_parse_from([
            "cas-stress",
            "--structure",
            "stack",
            "--producers",
            "30",
            "--producer-threads",
            "10",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        let config = cli.stress_config();
        assert_eq!(config.producer_tasks, 30);
        assert_eq!(config.producer_threads, 10);
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
    }
}
