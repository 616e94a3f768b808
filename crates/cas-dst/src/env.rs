//! DST environment: one seed, one RNG, one fault injector.

use crate::fault::{FaultConfig, FaultInjector, FaultStats};
use crate::random::DeterministicRng;

/// Everything a deterministic test needs, derived from a single seed.
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
}

impl DstEnv {
    /// Environment with the default fault configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    #[must_use]
    pub fn with_fault_config(seed: u64, config: FaultConfig) -> Self {
        Self {
            seed,
            rng: DeterministicRng::new(seed),
            // Separate stream so adding RNG draws does not move the faults.
            fault: FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), config),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    /// Maybe stall the calling thread to perturb timing.
    ///
    /// Returns whether a delay happened.
    pub fn maybe_delay(&mut self) -> bool {
        match self.fault.should_delay() {
            Some(spins) => {
                spin(spins);
                true
            }
            None => false,
        }
    }

    /// `DST_SEED=<seed>`, for failure messages.
    #[must_use]
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }

    #[must_use]
    pub fn stats(&self) -> &FaultStats {
        self.fault.stats()
    }
}

/// Busy-wait for `spins` iterations, then give up the time slice.
pub(crate) fn spin(spins: u32) {
    for _ in 0..spins {
        std::hint::spin_loop();
    }
    std::thread::yield_now();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seed() {
        let env = DstEnv::new(12345);
        assert_eq!(env.format_seed(), "DST_SEED=12345");
        assert_eq!(env.seed(), 12345);
    }

    #[test]
    fn test_same_seed_same_delays() {
        let run = |seed| {
            let mut env = DstEnv::with_fault_config(seed, FaultConfig::aggressive());
            (0..200).map(|_| env.maybe_delay()).collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_no_delay_without_faults() {
        let mut env = DstEnv::with_fault_config(1, FaultConfig::none());
        assert!((0..100).all(|_| !env.maybe_delay()));
        assert_eq!(env.stats().delays_count, 0);
    }
}
