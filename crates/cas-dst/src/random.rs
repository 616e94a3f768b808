//! Deterministic randomness.

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Seeded random number generator.
///
/// Same seed, same sequence: every random decision in a DST run goes
/// through one of these so a run can be replayed from `DST_SEED`.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: StdRng,
}

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a value from the standard distribution.
    pub fn gen<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        self.rng.gen()
    }

    /// Draw a value uniformly from `range`.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// `true` with probability `p`.
    pub fn gen_bool(&mut self, p: f64) -> bool {
        debug_assert!((0.0..=1.0).contains(&p), "Probability out of range: {}", p);
        self.rng.gen_bool(p)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = DeterministicRng::new(42);
        let mut b = DeterministicRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.gen::<u64>(), b.gen::<u64>());
        }
        assert_eq!(a.gen_range(0..1000_u32), b.gen_range(0..1000_u32));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let mut x: Vec<u32> = (0..50).collect();
        let mut y = x.clone();
        DeterministicRng::new(7).shuffle(&mut x);
        DeterministicRng::new(7).shuffle(&mut y);
        assert_eq!(x, y);
        x.sort_unstable();
        assert_eq!(x, (0..50).collect::<Vec<_>>());
    }
}
