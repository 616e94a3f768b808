//! Probabilistic fault injection driven by a deterministic RNG.

use std::fmt;

use serde::Serialize;

use crate::random::DeterministicRng;

/// Fault injection configuration.
#[derive(Debug, Clone, Serialize)]
pub struct FaultConfig {
    /// Probability that an operation boundary injects a fault
    pub failure_probability: f64,
    /// Probability that an operation boundary stalls the caller
    pub delay_probability: f64,
    /// Upper bound on spin iterations for one delay
    pub max_delay_spins: u32,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
            delay_probability: 0.1,
            max_delay_spins: 64,
        }
    }
}

impl FaultConfig {
    /// No faults and no delays.
    #[must_use]
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
            delay_probability: 0.0,
            max_delay_spins: 0,
        }
    }

    /// Configuration for stress testing.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.2,
            delay_probability: 0.3,
            max_delay_spins: 1024,
        }
    }
}

/// Counters kept by a [`FaultInjector`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct FaultStats {
    /// Fault decisions made
    pub checks_count: u64,
    /// Faults injected
    pub faults_count: u64,
    /// Delays injected
    pub delays_count: u64,
}

impl fmt::Display for FaultStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checks={} faults={} delays={}",
            self.checks_count, self.faults_count, self.delays_count
        )
    }
}

/// Decides, deterministically, where faults and delays happen.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.failure_probability),
            "failure_probability out of range"
        );
        debug_assert!(
            (0.0..=1.0).contains(&config.delay_probability),
            "delay_probability out of range"
        );

        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Should the current operation boundary inject a fault?
    pub fn should_fail(&mut self) -> bool {
        self.stats.checks_count += 1;
        let fail = self.config.failure_probability > 0.0
            && self.rng.gen_bool(self.config.failure_probability);
        if fail {
            self.stats.faults_count += 1;
        }
        fail
    }

    /// Spin count for a delay at this boundary, if one is injected.
    pub fn should_delay(&mut self) -> Option<u32> {
        if self.config.delay_probability <= 0.0 || self.config.max_delay_spins == 0 {
            return None;
        }
        if !self.rng.gen_bool(self.config.delay_probability) {
            return None;
        }
        self.stats.delays_count += 1;
        Some(self.rng.gen_range(1..=self.config.max_delay_spins))
    }

    /// Pick one of `choices` uniformly; used to select a fault type.
    pub fn choose(&mut self, choices: usize) -> usize {
        debug_assert!(choices > 0, "Nothing to choose from");
        self.rng.gen_range(0..choices)
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &FaultStats {
        &self.stats
    }
}
