//! Conjugate Gradient solver for symmetric banded systems.
//!
//! Solves `Ax = b` where `A` is a symmetric positive-definite
//! [`BandedMatrix`]. Every vector operation goes through
//! [`crate::kernels`], so the iteration inherits the kernels' fixed
//! summation order and a fixed input always reproduces the same iterates
//! bit for bit.
//!
//! # Algorithm
//!
//! ```text
//! r = b - A*x0          (r = b when x0 = 0)
//! v = r
//! rho = r . r
//! error = sqrt(rho)
//!
//! while k < max_iterations and error > tolerance:
//!     z = A * v
//!     alpha = rho / (v . z)
//!     x = x + alpha * v
//!     if rho < 1e-60:  r = b - A*x         (exact refresh)
//!     else:            r = r - alpha * z   (incremental)
//!     rho_prev = rho
//!     rho = r . r
//!     v = r + (rho / rho_prev) * v
//!     error = |sqrt(rho) - sqrt(rho_prev)|
//! ```
//!
//! # Convergence measure
//!
//! `error` is the change in residual norm between two steps, not the residual
//! norm itself. It can be non-monotonic. A tolerance `<= 0` disables early
//! exit and the loop runs the whole budget.
//!
//! The measure lags the residual by one step. The step that drives `||r||`
//! to round-off reports the whole drop as its `error`, so convergence is only
//! recognised on the following step. In exact arithmetic CG reaches the
//! solution within `n` steps; a budget of `n` leaves `x` accurate but may
//! still end [`Termination::Exhausted`], and a budget of `n + 1` is needed to
//! see [`Termination::Converged`].
//!
//! # Residual refresh
//!
//! Once `rho` drops below [`EXACT_RESIDUAL_THRESHOLD`] the incremental update
//! has lost all significant digits to drift, and the residual is recomputed
//! from `x` at the cost of one extra matrix-vector product per step.
//!
//! If `rho` reaches exactly zero the next step would divide zero by zero, so
//! the loop stops there and reports [`Termination::Converged`].

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::aligned::AlignedVec;
use crate::banded::BandedMatrix;
use crate::error::SolverError;
use crate::kernels;
use crate::traits::BandedSolver;
use crate::types::{IterationEntry, IterationLog, SolveOutcome, SolverConfig, Termination};
use crate::validation::{validate_params, validate_system};

/// `rho` below which the residual is recomputed exactly instead of updated.
pub const EXACT_RESIDUAL_THRESHOLD: f64 = 1e-60;

type Matvec = fn(&BandedMatrix, &[f64], &mut [f64]);

// ═══════════════════════════════════════════════════════════════════════════
// ConjugateGradientSolver
// ═══════════════════════════════════════════════════════════════════════════

/// Conjugate Gradient solver over banded storage.
///
/// # Example
///
/// ```
/// use bandcg_solver::banded::BandedMatrix;
/// use bandcg_solver::cg::ConjugateGradientSolver;
/// use bandcg_solver::traits::BandedSolver;
///
/// // 4 on the diagonal, 1 on the first off-diagonal.
/// let a = BandedMatrix::from_diagonals(5, 3, &[vec![4.0; 5], vec![1.0; 4]]).unwrap();
/// let b = vec![1.0; 5];
///
/// let solver = ConjugateGradientSolver::new(1e-12, 5);
/// let outcome = solver.solve(&a, &b, &[0.0; 5]).unwrap();
/// assert!(outcome.iterations <= 5);
/// ```
#[derive(Debug, Clone)]
pub struct ConjugateGradientSolver {
    tolerance: f64,
    max_iterations: usize,
    row_parallel: bool,
}

impl ConjugateGradientSolver {
    /// Solver with the given convergence parameters.
    ///
    /// `tolerance <= 0` disables early convergence. The loop still stops
    /// before the budget if the residual vanishes exactly (`rho == 0`), since
    /// the next step would compute `0 / 0`; such a run reports
    /// [`Termination::Converged`] with fewer than `max_iterations` steps.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            row_parallel: false,
        }
    }

    /// Solver using the tolerance and budget of a run configuration.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
    }

    /// Use the row-parallel matrix-vector product.
    ///
    /// Only effective with the `parallel` feature; otherwise the serial
    /// kernel is kept and [`row_parallel`](Self::row_parallel) stays
    /// `false`.
    pub fn with_row_parallel(mut self, enabled: bool) -> Self {
        if enabled && !cfg!(feature = "parallel") {
            debug!("CG: row-parallel matvec requested without the parallel feature");
        }
        self.row_parallel = enabled && cfg!(feature = "parallel");
        self
    }

    /// Convergence threshold on the approximate error.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Iteration budget.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Whether the row-parallel matvec is in use.
    #[inline]
    pub fn row_parallel(&self) -> bool {
        self.row_parallel
    }

    /// Solve from the zero initial guess.
    ///
    /// # Errors
    ///
    /// As [`BandedSolver::solve`].
    pub fn solve_from_zero(
        &self,
        matrix: &BandedMatrix,
        rhs: &[f64],
    ) -> Result<SolveOutcome, SolverError> {
        let zero = AlignedVec::zeroed(matrix.n());
        self.solve(matrix, rhs, &zero)
    }

    fn validate(
        &self,
        matrix: &BandedMatrix,
        rhs: &[f64],
        initial: &[f64],
    ) -> Result<(), SolverError> {
        validate_params(self.tolerance, self.max_iterations)?;
        validate_system(matrix, rhs, initial)
    }

    fn matvec(&self) -> Matvec {
        #[cfg(feature = "parallel")]
        {
            if self.row_parallel {
                return kernels::multiply_banded_parallel;
            }
        }
        kernels::multiply_banded
    }

    // -------------------------------------------------------------------
    // Core CG loop
    // -------------------------------------------------------------------

    fn solve_inner(
        &self,
        matrix: &BandedMatrix,
        rhs: &[f64],
        initial: &[f64],
    ) -> SolveOutcome {
        let start_time = Instant::now();
        let n = matrix.n();
        let multiply = self.matvec();

        // --- Working vectors, released on return ---
        let mut x = AlignedVec::from_slice(initial);
        let mut r = AlignedVec::zeroed(n);
        let mut v = AlignedVec::zeroed(n);
        let mut z = AlignedVec::zeroed(n);

        // --- r = b - A*x0, or plain r = b for the zero guess ---
        if initial.iter().all(|&xi| xi == 0.0) {
            kernels::copy(rhs, &mut r);
        } else {
            multiply(matrix, &x, &mut z);
            kernels::subtract(rhs, &z, &mut r);
        }
        kernels::copy(&r, &mut v);

        let mut rho = kernels::dot(&r, &r);
        let mut error = rho.sqrt();
        let mut log = IterationLog::with_budget(self.max_iterations);
        let mut refreshes = 0usize;

        debug!(
            "CG: n={}, bandwidth={}, tol={:.2e}, max_iter={}, ||r0||={:.6e}, simd={}, parallel={}",
            n,
            matrix.bandwidth(),
            self.tolerance,
            self.max_iterations,
            error,
            kernels::simd_available(),
            self.row_parallel,
        );

        // ===============================================================
        // Main loop
        // ===============================================================
        let mut k = 0usize;
        while k < self.max_iterations && error > self.tolerance && rho > 0.0 {
            let step_start = Instant::now();

            // --- z = A * v ---
            multiply(matrix, &v, &mut z);

            // --- alpha = rho / (v . z) ---
            let alpha = rho / kernels::dot(&v, &z);

            // --- x = x + alpha * v ---
            kernels::axpy(alpha, &v, &mut x);

            // --- residual refresh ---
            let residual_start = Instant::now();
            if rho < EXACT_RESIDUAL_THRESHOLD {
                multiply(matrix, &x, &mut z);
                kernels::subtract(rhs, &z, &mut r);
                refreshes += 1;
                debug!("CG iter {k}: rho = {rho:.3e}, exact residual refresh");
            } else {
                kernels::axpy(-alpha, &z, &mut r);
            }
            let residual_time_ms = residual_start.elapsed().as_secs_f64() * 1e3;

            // --- rho, v = r + (rho / rho_prev) * v ---
            let rho_prev = rho;
            rho = kernels::dot(&r, &r);
            kernels::xpby(&r, rho / rho_prev, &mut v);

            error = (rho.sqrt() - rho_prev.sqrt()).abs();

            log.push(IterationEntry {
                norm_residual: rho.sqrt(),
                error,
                cg_time_ms: step_start.elapsed().as_secs_f64() * 1e3,
                residual_time_ms,
            });

            trace!("CG iter {k}: ||r|| = {:.6e}, error = {error:.6e}", rho.sqrt());
            k += 1;
        }

        let termination = if error <= self.tolerance || rho == 0.0 {
            Termination::Converged
        } else {
            Termination::Exhausted
        };

        if !rho.is_finite() {
            warn!("CG: non-finite residual energy rho = {rho} after {k} iterations");
        } else if termination == Termination::Exhausted && self.tolerance > 0.0 {
            warn!(
                "CG: budget of {} iterations exhausted, error = {error:.6e} > tol = {:.2e}",
                self.max_iterations, self.tolerance,
            );
        }

        debug!(
            "CG: {termination} after {k} iterations in {:?}, ||r|| = {:.6e}, error = {error:.6e}, exact refreshes = {refreshes}",
            start_time.elapsed(),
            rho.sqrt(),
        );

        SolveOutcome {
            solution: x,
            log,
            iterations: k,
            termination,
            final_error: error,
            final_residual_norm: rho.sqrt(),
            exact_residual_refreshes: refreshes,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BandedSolver trait implementation
// ═══════════════════════════════════════════════════════════════════════════

impl BandedSolver for ConjugateGradientSolver {
    /// Run CG from `initial`.
    ///
    /// # Errors
    ///
    /// * [`SolverError::Config`] -- NaN tolerance or an excessive budget.
    /// * [`SolverError::DimensionMismatch`] -- `rhs` or `initial` has the
    ///   wrong length.
    fn solve(
        &self,
        matrix: &BandedMatrix,
        rhs: &[f64],
        initial: &[f64],
    ) -> Result<SolveOutcome, SolverError> {
        self.validate(matrix, rhs, initial)?;
        Ok(self.solve_inner(matrix, rhs, initial))
    }

    fn name(&self) -> &'static str {
        "cg"
    }
}

/// Solve `A x = b` from `initial_x` with the given tolerance and budget.
///
/// Shorthand for `ConjugateGradientSolver::new(tolerance, max_iterations)`
/// followed by [`BandedSolver::solve`].
///
/// # Errors
///
/// As [`BandedSolver::solve`].
pub fn solve(
    matrix: &BandedMatrix,
    b: &[f64],
    initial_x: &[f64],
    tolerance: f64,
    max_iterations: usize,
) -> Result<SolveOutcome, SolverError> {
    ConjugateGradientSolver::new(tolerance, max_iterations).solve(matrix, b, initial_x)
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
