//! # Byte Source
//!
//! Uniform random bytes for payload generation. The generator is injected so
//! a run (or a test) can be replayed from a fixed seed.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, RngExt, SeedableRng};
use std::ops::RangeInclusive;

/// Random byte generator backing every strategy.
#[derive(Debug, Clone)]
pub struct ByteSource<R> {
    rng: R,
}

impl ByteSource<StdRng> {
    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Fresh source seeded from the thread RNG.
    ///
    /// The seed is returned alongside so it can be logged and the run
    /// replayed later with [`ByteSource::seeded`].
    pub fn from_entropy() -> (Self, u64) {
        let seed: u64 = rand::rng().random();
        (Self::seeded(seed), seed)
    }
}

impl<R: Rng> ByteSource<R> {
    pub fn new(rng: R) -> Self {
        ByteSource { rng }
    }

    /// Returns exactly `len` bytes drawn uniformly from `0..=255`.
    pub fn generate(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.rng.fill_bytes(&mut buf);
        buf
    }

    /// Uniform integer in `range` (both ends inclusive).
    pub fn range(&mut self, range: RangeInclusive<usize>) -> usize {
        self.rng.random_range(range)
    }

    /// Uniform pick from `items`.
    ///
    /// # Panics
    ///
    /// Panics if `items` is empty.
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        *items
            .choose(&mut self.rng)
            .unwrap_or_else(|| panic!("pick from an empty slice"))
    }
}
