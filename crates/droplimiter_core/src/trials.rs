//! # Trial Sources
//!
//! Where the engine gets its randomness. The engine never reaches for a
//! global RNG: a run is reproducible given the same inputs, the same `now`
//! and the same trial source.
//!
//! A trial with probability `p` succeeds iff a uniform draw from `[0, 100%)`
//! is strictly below `p`. A probability of 0% therefore never succeeds and
//! 100% always does.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::percent::Percent;

/// A source of uniform percentage draws.
pub trait TrialSource {
    /// Draws a uniform value in `[0%, 100%)`.
    fn draw(&mut self) -> Percent;

    /// Runs one trial with the given success probability.
    fn trial(&mut self, probability: Percent) -> bool {
        self.draw() < probability
    }
}

impl<T: TrialSource + ?Sized> TrialSource for &mut T {
    fn draw(&mut self) -> Percent {
        (**self).draw()
    }
}

/// ChaCha8-backed trials, seedable for reproducible runs.
#[derive(Clone, Debug)]
pub struct SeededTrials {
    rng: ChaCha8Rng,
}

impl SeededTrials {
    /// Creates a source with a fixed seed.
    #[must_use]
    pub fn from_seed_u64(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl TrialSource for SeededTrials {
    fn draw(&mut self) -> Percent {
        Percent::from_raw(self.rng.gen_range(0..Percent::HUNDRED.raw()))
    }
}

/// Always draws the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedTrials {
    value: Percent,
}

impl FixedTrials {
    /// Draws `value` every time.
    #[must_use]
    pub const fn new(value: Percent) -> Self {
        Self { value }
    }

    /// Every trial with a non-zero probability succeeds.
    #[must_use]
    pub const fn always() -> Self {
        Self::new(Percent::ZERO)
    }

    /// No trial ever succeeds.
    #[must_use]
    pub const fn never() -> Self {
        Self::new(Percent::HUNDRED)
    }
}

impl TrialSource for FixedTrials {
    fn draw(&mut self) -> Percent {
        self.value
    }
}
