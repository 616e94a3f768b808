//! # cas-dst
//!
//! Deterministic Simulation Testing and stress harness for the lock-free
//! collections in `cas-collections`.
//!
//! All randomness and fault decisions derive from one seed, so any DST
//! run is reproducible.
//!
//! ## Harnesses
//!
//! - `fault_injection`: single-threaded runs with faults at operation
//!   boundaries, followed by the `cas-core` invariant checks
//! - `harness`: multi-threaded producer/consumer stress with coordinated
//!   shutdown
//!
//! ## Usage
//!
//! ```rust
//! use cas_collections::LockFreeQueue;
//! use cas_dst::{run_dst_scenario, DeterministicRng, DstOp};
//!
//! let seed = 12345;
//! let mut rng = DeterministicRng::new(seed);
//! let ops = DstOp::random_sequence(&mut rng, 100);
//! let result = run_dst_scenario::<LockFreeQueue<u64>>(seed, ops);
//! assert!(result.passed, "{}", result.format());
//! ```
//!
//! ## Reproducibility
//!
//! To reproduce a failing test:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod env;
pub mod fault;
pub mod fault_injection;
pub mod harness;
pub mod logging;
pub mod random;

pub use env::DstEnv;
pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use fault_injection::{
    run_dst_scenario, run_dst_scenario_with, DstOp, DstResult, DstRunner, DstStats, FaultPoint,
    FaultType,
};
pub use harness::{run_stress, HarnessError, StressConfig, StressReport};
pub use logging::{init_logging, init_test_logging};
pub use random::DeterministicRng;

use tracing::{info, warn};

/// Get DST seed from environment or generate random one.
///
/// Logs the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
/// An unparseable `DST_SEED` is reported and replaced by a random seed.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED").map(|s| s.parse::<u64>()) {
        Ok(Ok(seed)) => {
            info!("DST_SEED={} (from environment)", seed);
            seed
        }
        Ok(Err(e)) => {
            let seed = rand::random::<u64>();
            warn!(error = %e, "DST_SEED is not a valid u64; DST_SEED={} (randomly generated)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            info!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}

/// Iteration count from `DST_ITERATIONS`, or `default`.
#[must_use]
pub fn dst_iterations(default: usize) -> usize {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
