//! Core types shared by the solver, the driver and the reporting layer.
//!
//! Provides [`SolverConfig`] for run configuration, [`IterationLog`] for the
//! per-iteration record, and [`SolveOutcome`] for everything a solve hands
//! back to its caller.

use serde::{Deserialize, Serialize};

use crate::aligned::AlignedVec;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Seed used by the command-line driver when none is given.
pub const DEFAULT_SEED: u64 = 20162;

/// Tolerance value meaning "unset": early convergence is disabled and the
/// loop runs for the whole iteration budget.
pub const UNSET_TOLERANCE: f64 = -1.0;

/// Configuration for one generated run.
///
/// Read-only for the duration of the run; the number of iterations actually
/// performed comes back in [`SolveOutcome::iterations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// System dimension.
    pub n: usize,
    /// Number of bands (odd).
    pub bandwidth: usize,
    /// Iteration budget.
    pub max_iterations: usize,
    /// Convergence threshold on the approximate error; `<= 0` disables it.
    pub tolerance: f64,
    /// Seed for the random diagonal generator.
    pub seed: u64,
}

impl SolverConfig {
    /// Configuration with the defaults of the command-line driver: an
    /// iteration budget of `n`, unset tolerance and [`DEFAULT_SEED`].
    pub fn new(n: usize, bandwidth: usize) -> Self {
        Self {
            n,
            bandwidth,
            max_iterations: n,
            tolerance: UNSET_TOLERANCE,
            seed: DEFAULT_SEED,
        }
    }

    /// Override the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Override the generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// `true` when early convergence is enabled.
    #[inline]
    pub fn has_tolerance(&self) -> bool {
        self.tolerance > 0.0
    }
}

// ---------------------------------------------------------------------------
// Iteration log
// ---------------------------------------------------------------------------

/// Metadata recorded after one completed CG step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationEntry {
    /// Euclidean norm of the residual, `sqrt(rho)`.
    pub norm_residual: f64,
    /// Approximate error `|sqrt(rho) - sqrt(rho_prev)|`.
    pub error: f64,
    /// Wall time of the whole step in milliseconds.
    pub cg_time_ms: f64,
    /// Wall time of the residual refresh in milliseconds.
    pub residual_time_ms: f64,
}

/// Append-only record of completed iterations.
///
/// Holds exactly one entry per completed step, so `len()` is the actual
/// iteration count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationLog {
    entries: Vec<IterationEntry>,
}

impl IterationLog {
    /// Empty log with room for `budget` entries. Reservation is capped so a
    /// huge budget does not allocate up front.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            entries: Vec::with_capacity(budget.min(4096)),
        }
    }

    /// Record one completed step.
    #[inline]
    pub fn push(&mut self, entry: IterationEntry) {
        self.entries.push(entry);
    }

    /// Number of recorded iterations.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no iteration ran.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in iteration order.
    #[inline]
    pub fn entries(&self) -> &[IterationEntry] {
        &self.entries
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, IterationEntry> {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&IterationEntry> {
        self.entries.last()
    }

    /// Residual norms in iteration order.
    pub fn norms(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.norm_residual)
    }

    /// Approximate errors in iteration order.
    pub fn errors(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.error)
    }

    /// Per-step wall times in milliseconds.
    pub fn cg_times_ms(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.cg_time_ms)
    }

    /// Residual-refresh wall times in milliseconds.
    pub fn residual_times_ms(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.residual_time_ms)
    }
}

impl<'a> IntoIterator for &'a IterationLog {
    type Item = &'a IterationEntry;
    type IntoIter = std::slice::Iter<'a, IterationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Solve outcome
// ---------------------------------------------------------------------------

/// Terminal state of the CG loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The approximate error fell to or below the tolerance, or the residual
    /// vanished exactly.
    Converged,
    /// The iteration budget ran out first. Not an error; the caller decides
    /// what a non-minimal residual means.
    Exhausted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Everything a solve hands back.
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    /// Approximate solution `x`.
    pub solution: AlignedVec,
    /// One entry per completed iteration.
    pub log: IterationLog,
    /// Number of completed iterations (equals `log.len()`).
    pub iterations: usize,
    /// How the loop ended.
    pub termination: Termination,
    /// Approximate error when the loop ended (`sqrt(rho_0)` if no step ran).
    pub final_error: f64,
    /// Residual norm `sqrt(rho)` when the loop ended.
    pub final_residual_norm: f64,
    /// Number of steps that recomputed the exact residual `b - A x`.
    pub exact_residual_refreshes: usize,
}

impl SolveOutcome {
    /// `true` if the loop stopped on tolerance rather than budget.
    #[inline]
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}
