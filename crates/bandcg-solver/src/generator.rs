//! Input generators for the benchmark workload.
//!
//! [`RandomDiagonalGenerator`] fills diagonals with seeded uniform values and
//! biases the main diagonal by `bandwidth - 1`, which makes every generated
//! matrix strictly diagonally dominant. [`SineRhs`] is the fixed
//! right-hand side.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aligned::AlignedVec;
use crate::error::AssemblyError;
use crate::traits::{DiagonalGenerator, RhsGenerator};
use crate::types::DEFAULT_SEED;
use crate::validation::MIN_DIMENSION;

/// Seeded random diagonal source.
///
/// Diagonal `k` of length `n - k` holds `factor + u` with `u` uniform in
/// `[0, 1)` and `factor = bandwidth - 1` for the main diagonal, `0`
/// otherwise. Each row of the assembled matrix has at most `bandwidth - 1`
/// off-diagonal entries below `1`, so the main diagonal dominates strictly.
///
/// Diagonals are drawn from one stream in request order, so the same seed and
/// request sequence always yield the same matrix.
#[derive(Debug, Clone)]
pub struct RandomDiagonalGenerator {
    seed: u64,
    rng: StdRng,
}

impl RandomDiagonalGenerator {
    /// Generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for RandomDiagonalGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl DiagonalGenerator for RandomDiagonalGenerator {
    /// # Errors
    ///
    /// [`AssemblyError::DiagonalRejected`] if `n < 3`, `bandwidth > n / 2`
    /// or `k` exceeds the half bandwidth.
    fn generate(
        &mut self,
        n: usize,
        k: usize,
        bandwidth: usize,
    ) -> Result<Vec<f64>, AssemblyError> {
        if n < MIN_DIMENSION || bandwidth > n / 2 || k > bandwidth / 2 {
            return Err(AssemblyError::DiagonalRejected { n, k, bandwidth });
        }

        let factor = if k == 0 {
            bandwidth.saturating_sub(1) as f64
        } else {
            0.0
        };

        Ok((0..n - k).map(|_| factor + self.rng.gen::<f64>()).collect())
    }
}

/// Closed-form right-hand side
///
/// ```text
/// b[i] = 4 pi^2 * (sin(2 pi x) + sin(2 pi (pi - x))),   x = i * pi / n
/// ```
///
/// Each entry is computed directly from `i`, so the vector is independent of
/// evaluation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SineRhs;

impl SineRhs {
    /// Value of entry `i` for dimension `n`.
    #[inline]
    pub fn value(i: usize, n: usize) -> f64 {
        let two_pi = 2.0 * PI;
        let x = i as f64 * PI / n as f64;
        2.0 * two_pi * PI * ((two_pi * x).sin() + (two_pi * (PI - x)).sin())
    }
}

impl RhsGenerator for SineRhs {
    fn generate(&self, n: usize) -> AlignedVec {
        let mut b = AlignedVec::zeroed(n);
        for (i, bi) in b.iter_mut().enumerate() {
            *bi = Self::value(i, n);
        }
        b
    }
}
