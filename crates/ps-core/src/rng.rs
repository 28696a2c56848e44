//! Deterministic simulation RNG with the extra distributions protocols need.
//!
//! # Determinism strategy
//!
//! A run owns exactly one `SimRng`, seeded from `random.seed`.  Every random
//! decision the engine makes (node order, churn victims, event jitter) and
//! every decision protocol code makes through its context draws from that one
//! stream, in a single-threaded order fixed by the dispatch loops.  Same seed
//! and same configuration therefore give a bit-identical run.
//!
//! Components that need an independent stream (for example a wiring pass
//! that must not perturb protocol randomness) derive one with
//! [`SimRng::child`].

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Poisson};

use crate::{PsError, PsResult};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Simulation-level random source.
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    ///
    /// Consumes one draw from `self`, so the parent stream stays
    /// deterministic too.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Sample a uniformly distributed value of any `Standard`-distributed type.
    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform draw in `[0, n)` over the full 64-bit domain.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    #[inline]
    pub fn below(&mut self, n: u64) -> u64 {
        self.0.gen_range(0..n)
    }

    /// Uniform index in `[0, n)`.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }

    /// Poisson-distributed count with the given mean.
    pub fn poisson(&mut self, mean: f64) -> PsResult<u64> {
        let dist = Poisson::new(mean).map_err(|e| PsError::Distribution(e.to_string()))?;
        let v: f64 = dist.sample(&mut self.0);
        Ok(v as u64)
    }

    /// Exponentially distributed value with the given mean (not rate).
    pub fn exponential(&mut self, mean: f64) -> PsResult<f64> {
        if !(mean > 0.0 && mean.is_finite()) {
            return Err(PsError::Distribution(format!("exponential mean must be positive, got {mean}")));
        }
        let dist = Exp::new(1.0 / mean).map_err(|e| PsError::Distribution(e.to_string()))?;
        Ok(dist.sample(&mut self.0))
    }

    /// Power-law value `base / u^a - base` for `u` uniform in `(0, 1]`.
    pub fn power(&mut self, base: f64, a: f64) -> f64 {
        let u = 1.0 - self.random::<f64>();
        base / u.powf(a) - base
    }
}
