//! Fault injection for lock-free collections.
//!
//! DST injects faults at OPERATION BOUNDARIES, not inside atomic sequences.
//! The collection code is untouched; every fault happens in the runner.
//!
//! | Concern | Level |
//! |---------|-------|
//! | Memory allocation | Operation boundary (`try_insert` never starts) |
//! | Thread crash | Operation boundary (before or after the call) |
//! | Scheduling jitter | Operation boundary (spin delay) |
//! | Epoch reclamation timing | Between operations (pin + flush) |
//!
//! ```text
//!   FaultPoint (pre-op) ──> insert()/take() ──> FaultPoint (post-op)
//!         │                                          │
//!   "Fail allocation?"                    "Crash before return?"
//! ```

use cas_collections::{ConcurrentCollection, Tracked};
use cas_core::invariants::check_collection;
use cas_core::PropertyResult;
use crossbeam_epoch as epoch;
use serde::Serialize;
use tracing::debug;

use crate::env::spin;
use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Fault injection points (between operations, not inside).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Before starting an operation
    BeforeOperation,
    /// After operation completes (before returning to caller)
    AfterOperation,
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultType {
    /// Node allocation fails; the value goes back to the caller
    AllocationFailure,
    /// Thread "crashes" (operation abandoned)
    ThreadCrash,
    /// Delay (simulates slow thread)
    Delay,
    /// Epoch collector advanced and flushed
    EpochAdvance,
}

/// DST operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    /// `add` / `push` of a distinct value
    Insert(u64),
    /// `remove` / `pop`
    Remove,
}

impl DstOp {
    /// `count` random operations; inserted values are distinct.
    #[must_use]
    pub fn random_sequence(rng: &mut DeterministicRng, count: usize) -> Vec<DstOp> {
        let mut next_value = 1_u64;
        (0..count)
            .map(|_| {
                if rng.gen_bool(0.55) {
                    let op = DstOp::Insert(next_value);
                    next_value += 1;
                    op
                } else {
                    DstOp::Remove
                }
            })
            .collect()
    }
}

/// DST test runner for lock-free collections.
///
/// Wraps the collection in [`Tracked`] and injects faults at operation
/// boundaries. No code instrumentation needed.
pub struct DstRunner<C> {
    collection: Tracked<C>,
    fault_injector: FaultInjector,
    seed: u64,
    operations_count: u64,
    faults_injected: u64,
    abandoned_operations: u64,
    rejected_inserts: u64,
    epoch_advances: u64,
}

impl<C: ConcurrentCollection<u64> + Default> DstRunner<C> {
    /// Create a new DST runner with the default fault configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, FaultConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: FaultConfig) -> Self {
        Self {
            collection: Tracked::default(),
            fault_injector: FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), config),
            seed,
            operations_count: 0,
            faults_injected: 0,
            abandoned_operations: 0,
            rejected_inserts: 0,
            epoch_advances: 0,
        }
    }
}

impl<C: ConcurrentCollection<u64>> DstRunner<C> {
    /// Get the seed for reproduction.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The tracked collection under test.
    #[must_use]
    pub fn collection(&self) -> &Tracked<C> {
        &self.collection
    }

    /// Insert with fault injection at boundaries.
    ///
    /// On `AllocationFailure` the value was never inserted; on a crash
    /// after the call it was, but the caller never learns it.
    pub fn insert(&mut self, value: u64) -> Result<(), FaultType> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            match fault {
                FaultType::AllocationFailure => {
                    self.rejected_inserts += 1;
                    return Err(fault);
                }
                FaultType::ThreadCrash => {
                    self.abandoned_operations += 1;
                    return Err(fault);
                }
                FaultType::Delay | FaultType::EpochAdvance => {}
            }
        }

        if self.collection.try_insert(value).is_err() {
            // A real allocation failure behaves like an injected one.
            self.rejected_inserts += 1;
            return Err(FaultType::AllocationFailure);
        }
        self.operations_count += 1;

        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            self.abandoned_operations += 1;
            return Err(FaultType::ThreadCrash);
        }

        Ok(())
    }

    /// Remove with fault injection at boundaries.
    ///
    /// A crash after the call loses the caller's copy of the value; the
    /// collection still counts it as removed.
    pub fn take(&mut self) -> Result<Option<u64>, FaultType> {
        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            self.abandoned_operations += 1;
            return Err(FaultType::ThreadCrash);
        }

        let result = self.collection.take();
        self.operations_count += 1;

        if let Some(FaultType::ThreadCrash) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            self.abandoned_operations += 1;
            return Err(FaultType::ThreadCrash);
        }

        Ok(result)
    }

    /// Maybe stall, then maybe inject a fault at the given point.
    ///
    /// Stalls are drawn with `delay_probability` at every boundary. `Delay`
    /// and `EpochAdvance` take effect here and let the operation
    /// proceed; the other faults are acted on by the caller.
    fn maybe_inject_fault(&mut self, point: FaultPoint) -> Option<FaultType> {
        if let Some(spins) = self.fault_injector.should_delay() {
            spin(spins);
        }
        if !self.fault_injector.should_fail() {
            return None;
        }

        let fault = match self.fault_injector.choose(4) {
            0 if point == FaultPoint::BeforeOperation => FaultType::AllocationFailure,
            0 | 1 => FaultType::ThreadCrash,
            2 => FaultType::Delay,
            _ => FaultType::EpochAdvance,
        };
        self.faults_injected += 1;
        debug!(seed = self.seed, ?point, ?fault, "injecting fault");

        match fault {
            FaultType::Delay => {
                let spins = self.fault_injector.config().max_delay_spins.max(1);
                spin(spins);
            }
            FaultType::EpochAdvance => {
                self.epoch_advances += 1;
                epoch::pin().flush();
            }
            FaultType::AllocationFailure | FaultType::ThreadCrash => {}
        }

        Some(fault)
    }

    /// Check every invariant of the collection's discipline.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<PropertyResult> {
        check_collection(
            self.collection.discipline(),
            &self.collection,
            Some(self.seed),
        )
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> DstStats {
        DstStats {
            seed: self.seed,
            operations_count: self.operations_count,
            faults_injected: self.faults_injected,
            abandoned_operations: self.abandoned_operations,
            rejected_inserts: self.rejected_inserts,
            epoch_advances: self.epoch_advances,
            delays: self.fault_injector.stats().delays_count,
        }
    }
}

/// Statistics from DST run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DstStats {
    pub seed: u64,
    pub operations_count: u64,
    pub faults_injected: u64,
    pub abandoned_operations: u64,
    pub rejected_inserts: u64,
    pub epoch_advances: u64,
    /// Boundary stalls drawn with `delay_probability`
    pub delays: u64,
}

impl DstStats {
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "DST_SEED={} ops={} faults={} abandoned={} rejected={} epoch_advances={} delays={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.abandoned_operations,
            self.rejected_inserts,
            self.epoch_advances,
            self.delays
        )
    }
}

/// Run a DST scenario with the default fault configuration.
///
/// Operations are executed with fault injection. Invariants checked at end.
pub fn run_dst_scenario<C>(seed: u64, operations: Vec<DstOp>) -> DstResult
where
    C: ConcurrentCollection<u64> + Default,
{
    run_dst_scenario_with::<C>(seed, FaultConfig::default(), operations)
}

/// Run a DST scenario with an explicit fault configuration.
pub fn run_dst_scenario_with<C>(seed: u64, config: FaultConfig, operations: Vec<DstOp>) -> DstResult
where
    C: ConcurrentCollection<u64> + Default,
{
    let mut runner: DstRunner<C> = DstRunner::with_config(seed, config);
    let mut fault_errors = Vec::new();

    for op in operations {
        let result = match op {
            DstOp::Insert(v) => runner.insert(v),
            DstOp::Remove => runner.take().map(|_| ()),
        };

        // Faults are expected - they're part of the test
        if let Err(fault) = result {
            fault_errors.push(fault);
        }
    }

    let violations: Vec<String> = runner
        .check_invariants()
        .into_iter()
        .filter(|r| !r.passed)
        .map(|r| r.to_string())
        .collect();

    DstResult {
        passed: violations.is_empty(),
        violations,
        stats: runner.stats(),
        fault_errors,
    }
}

/// DST result.
#[derive(Debug, Clone, Serialize)]
pub struct DstResult {
    pub passed: bool,
    /// Rendered failing properties, counterexamples included
    pub violations: Vec<String>,
    pub stats: DstStats,
    /// Faults surfaced to the caller, in order
    pub fault_errors: Vec<FaultType>,
}

impl DstResult {
    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats.format());

        for violation in &self.violations {
            result.push_str("\n  VIOLATION: ");
            result.push_str(violation);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_collections::AllocError;
    use std::sync::Mutex;

    /// Mutex-backed stack for testing the runner itself.
    #[derive(Default)]
    struct MockStack {
        values: Mutex<Vec<u64>>,
    }

    impl ConcurrentCollection<u64> for MockStack {
        fn discipline(&self) -> cas_core::Discipline {
            cas_core::Discipline::Lifo
        }

        fn insert(&self, value: u64) {
            self.values.lock().unwrap().push(value);
        }

        fn try_insert(&self, value: u64) -> Result<(), AllocError<u64>> {
            self.insert(value);
            Ok(())
        }

        fn take(&self) -> Option<u64> {
            self.values.lock().unwrap().pop()
        }

        fn is_empty(&self) -> bool {
            self.values.lock().unwrap().is_empty()
        }

        fn snapshot(&self) -> Vec<u64> {
            self.values.lock().unwrap().iter().rev().copied().collect()
        }
    }

    #[test]
    fn test_dst_runner_basic() {
        let mut runner: DstRunner<MockStack> = DstRunner::new(12345);

        // These might fail due to fault injection, and that's OK
        let _ = runner.insert(1);
        let _ = runner.insert(2);
        let _ = runner.take();

        let violations: Vec<_> = runner
            .check_invariants()
            .into_iter()
            .filter(|r| !r.passed)
            .collect();
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn test_dst_scenario() {
        let ops = vec![
            DstOp::Insert(100),
            DstOp::Insert(200),
            DstOp::Remove,
            DstOp::Insert(300),
        ];

        let result = run_dst_scenario::<MockStack>(12345, ops);

        // Even with faults, invariants should hold
        assert!(result.passed, "DST failed: {}", result.format());
    }

    #[test]
    fn test_determinism() {
        let mut rng = DeterministicRng::new(5);
        let ops = DstOp::random_sequence(&mut rng, 200);

        let result1 =
            run_dst_scenario_with::<MockStack>(42, FaultConfig::aggressive(), ops.clone());
        let result2 = run_dst_scenario_with::<MockStack>(42, FaultConfig::aggressive(), ops);

        // Same seed = same faults = same stats
        assert_eq!(result1.stats, result2.stats);
        assert_eq!(result1.fault_errors, result2.fault_errors);
        assert!(result1.stats.faults_injected > 0);
    }

    #[test]
    fn test_no_faults_means_no_errors() {
        let ops = vec![DstOp::Insert(1), DstOp::Remove, DstOp::Remove];
        let result = run_dst_scenario_with::<MockStack>(1, FaultConfig::none(), ops);
        assert!(result.passed);
        assert!(result.fault_errors.is_empty());
        assert_eq!(result.stats.operations_count, 3);
        assert!(result.format().starts_with("[PASS] DST_SEED=1 ops=3"));
    }

    #[test]
    fn test_boundaries_stall_with_delay_probability() {
        let config = FaultConfig {
            failure_probability: 0.0,
            delay_probability: 1.0,
            max_delay_spins: 4,
        };
        let ops = vec![DstOp::Insert(1), DstOp::Remove, DstOp::Remove];
        let result = run_dst_scenario_with::<MockStack>(3, config, ops);
        assert!(result.passed, "{}", result.format());
        // One stall before and one after each operation.
        assert_eq!(result.stats.delays, 6);
        assert_eq!(result.stats.faults_injected, 0);

        let quiet = run_dst_scenario_with::<MockStack>(3, FaultConfig::none(), vec![DstOp::Remove]);
        assert_eq!(quiet.stats.delays, 0);
    }

    #[test]
    fn test_random_sequence_values_distinct() {
        let mut rng = DeterministicRng::new(11);
        let ops = DstOp::random_sequence(&mut rng, 500);
        let mut inserted: Vec<u64> = ops
            .iter()
            .filter_map(|op| match op {
                DstOp::Insert(v) => Some(*v),
                DstOp::Remove => None,
            })
            .collect();
        let before = inserted.len();
        inserted.dedup();
        assert_eq!(inserted.len(), before);
    }
}
