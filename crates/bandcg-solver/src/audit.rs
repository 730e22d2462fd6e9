//! Audit trail for solver runs.
//!
//! A [`SolveAuditEntry`] fingerprints the system (matrix + rhs), the solution
//! and the iteration history of one solve. Two runs with the same seed and
//! parameters must produce identical fingerprints, which is how run-to-run
//! reproducibility is checked without shipping whole vectors around.
//!
//! # Hashing
//!
//! [`std::hash::DefaultHasher`] over the raw bit patterns of every value.
//! Good enough for reproducibility checks; not a cryptographic digest.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::banded::BandedMatrix;
use crate::types::{IterationLog, SolveOutcome};

// ---------------------------------------------------------------------------
// Audit entry
// ---------------------------------------------------------------------------

/// Audit record for one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveAuditEntry {
    /// Caller-chosen identifier for the run.
    pub run_id: String,

    /// Solver that produced the outcome.
    pub solver: String,

    /// 8-byte hash of the matrix and rhs, from [`hash_system`].
    pub input_hash: [u8; 8],

    /// 8-byte hash of the solution vector, from [`hash_solution`].
    pub output_hash: [u8; 8],

    /// 8-byte hash of the residual norms and errors, from [`hash_log`].
    /// Timings are excluded.
    pub log_hash: [u8; 8],

    /// Completed iterations.
    pub iterations: usize,

    /// Whether the loop stopped on tolerance.
    pub converged: bool,

    /// Final approximate error.
    pub final_error: f64,

    /// Final residual norm.
    pub residual: f64,

    /// Wall-clock time between `start` and `finish` in microseconds.
    pub wall_time_us: u64,

    /// Timestamp as nanoseconds since the Unix epoch.
    pub timestamp_ns: u128,

    /// System dimension.
    pub n: usize,

    /// Matrix bandwidth.
    pub bandwidth: usize,
}

impl SolveAuditEntry {
    /// `true` when both entries describe bit-identical inputs and results.
    pub fn same_fingerprint(&self, other: &Self) -> bool {
        self.input_hash == other.input_hash
            && self.output_hash == other.output_hash
            && self.log_hash == other.log_hash
    }
}

// ---------------------------------------------------------------------------
// Hash helpers
// ---------------------------------------------------------------------------

/// Deterministic fingerprint of `(A, b)`.
///
/// Covers the shape, both band buffers (padding included, which is always
/// zero) and the rhs.
pub fn hash_system(matrix: &BandedMatrix, rhs: &[f64]) -> [u8; 8] {
    let mut h = DefaultHasher::new();

    matrix.n().hash(&mut h);
    matrix.bandwidth().hash(&mut h);

    for &v in matrix.main_diagonal() {
        v.to_bits().hash(&mut h);
    }
    for &v in matrix.off_diagonals() {
        v.to_bits().hash(&mut h);
    }
    for &v in rhs {
        v.to_bits().hash(&mut h);
    }

    h.finish().to_le_bytes()
}

/// Deterministic fingerprint of a solution vector.
pub fn hash_solution(solution: &[f64]) -> [u8; 8] {
    let mut h = DefaultHasher::new();
    for &v in solution {
        v.to_bits().hash(&mut h);
    }
    h.finish().to_le_bytes()
}

/// Deterministic fingerprint of the numeric part of an iteration log.
pub fn hash_log(log: &IterationLog) -> [u8; 8] {
    let mut h = DefaultHasher::new();
    log.len().hash(&mut h);
    for entry in log {
        entry.norm_residual.to_bits().hash(&mut h);
        entry.error.to_bits().hash(&mut h);
    }
    h.finish().to_le_bytes()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SolveAuditEntry`].
///
/// The input hash is taken in [`start`](Self::start), before the solve runs.
///
/// # Example
///
/// ```
/// use bandcg_solver::audit::AuditBuilder;
/// use bandcg_solver::banded::BandedMatrix;
/// use bandcg_solver::cg::solve;
///
/// let a = BandedMatrix::from_diagonals(4, 1, &[vec![4.0; 4]]).unwrap();
/// let b = [1.0; 4];
/// let audit = AuditBuilder::start("run-1", &a, &b);
/// let outcome = solve(&a, &b, &[0.0; 4], 1e-6, 4).unwrap();
/// let entry = audit.finish(&outcome, "cg");
/// assert_eq!(entry.iterations, 1);
/// ```
pub struct AuditBuilder {
    run_id: String,
    input_hash: [u8; 8],
    n: usize,
    bandwidth: usize,
    start: Instant,
    timestamp_ns: u128,
}

impl AuditBuilder {
    /// Begin an audit record and hash the inputs.
    pub fn start(run_id: impl Into<String>, matrix: &BandedMatrix, rhs: &[f64]) -> Self {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos();

        Self {
            run_id: run_id.into(),
            input_hash: hash_system(matrix, rhs),
            n: matrix.n(),
            bandwidth: matrix.bandwidth(),
            start: Instant::now(),
            timestamp_ns,
        }
    }

    /// Complete the record from the solve outcome.
    pub fn finish(self, outcome: &SolveOutcome, solver: &str) -> SolveAuditEntry {
        SolveAuditEntry {
            run_id: self.run_id,
            solver: solver.to_string(),
            input_hash: self.input_hash,
            output_hash: hash_solution(&outcome.solution),
            log_hash: hash_log(&outcome.log),
            iterations: outcome.iterations,
            converged: outcome.converged(),
            final_error: outcome.final_error,
            residual: outcome.final_residual_norm,
            wall_time_us: self.start.elapsed().as_micros() as u64,
            timestamp_ns: self.timestamp_ns,
            n: self.n,
            bandwidth: self.bandwidth,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
