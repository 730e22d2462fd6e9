//! Collaborator seams.
//!
//! The numeric core does not decide where its inputs come from. Matrix
//! diagonals are requested from a [`DiagonalGenerator`], the right-hand side
//! from an [`RhsGenerator`], and the iterative method is reached through
//! [`BandedSolver`] so the driver can be exercised with any implementation.

use crate::aligned::AlignedVec;
use crate::banded::BandedMatrix;
use crate::error::{AssemblyError, SolverError};
use crate::types::SolveOutcome;

/// Source of the diagonals of a symmetric banded matrix.
///
/// Any `FnMut(n, k, bandwidth) -> Result<Vec<f64>, AssemblyError>` closure
/// is a generator, which keeps ad-hoc fixtures short.
pub trait DiagonalGenerator {
    /// Produce diagonal `k` (`0` is the main diagonal) of an `n x n` matrix
    /// with the given bandwidth. The result must have length `n - k`.
    ///
    /// The main diagonal must be biased so that the assembled matrix is
    /// diagonally dominant.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] for a structurally invalid
    /// `(n, k, bandwidth)` combination.
    fn generate(&mut self, n: usize, k: usize, bandwidth: usize)
        -> Result<Vec<f64>, AssemblyError>;
}

impl<F> DiagonalGenerator for F
where
    F: FnMut(usize, usize, usize) -> Result<Vec<f64>, AssemblyError>,
{
    #[inline]
    fn generate(
        &mut self,
        n: usize,
        k: usize,
        bandwidth: usize,
    ) -> Result<Vec<f64>, AssemblyError> {
        self(n, k, bandwidth)
    }
}

/// Deterministic right-hand side: a fixed function of `n`, never random.
pub trait RhsGenerator {
    /// Produce the length-`n` right-hand side vector.
    fn generate(&self, n: usize) -> AlignedVec;
}

/// An iterative solver for `A x = b` over a [`BandedMatrix`].
pub trait BandedSolver {
    /// Solve starting from `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::DimensionMismatch`] when `rhs` or `initial`
    /// does not have length `matrix.n()`. Running out of iterations is not
    /// an error.
    fn solve(
        &self,
        matrix: &BandedMatrix,
        rhs: &[f64],
        initial: &[f64],
    ) -> Result<SolveOutcome, SolverError>;

    /// Short identifier for logs and reports.
    fn name(&self) -> &'static str;
}
