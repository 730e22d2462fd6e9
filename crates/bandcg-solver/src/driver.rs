//! End-to-end run: validate, assemble, generate the rhs, solve.

use std::time::Instant;

use tracing::{debug, info};

use crate::aligned::AlignedVec;
use crate::audit::AuditBuilder;
use crate::banded::build_banded_matrix;
use crate::cg::ConjugateGradientSolver;
use crate::error::SolverError;
use crate::generator::{RandomDiagonalGenerator, SineRhs};
use crate::kernels;
use crate::report::RunReport;
use crate::traits::{BandedSolver, DiagonalGenerator, RhsGenerator};
use crate::types::SolverConfig;
use crate::validation::validate_config;

/// Options that change how a run executes but not what it computes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Use the row-parallel matrix-vector product when available.
    pub row_parallel: bool,
}

/// Run the standard workload: a seeded random banded matrix, the sine rhs
/// and CG from `x0 = 0`.
///
/// # Errors
///
/// [`SolverError::Config`] for an invalid configuration (checked before
/// anything is allocated) or [`SolverError::Assembly`] if generation fails.
///
/// # Example
///
/// ```
/// use bandcg_solver::driver::run;
/// use bandcg_solver::types::SolverConfig;
///
/// let report = run(&SolverConfig::new(64, 5).with_tolerance(1e-10)).unwrap();
/// assert!(report.outcome.converged());
/// ```
pub fn run(config: &SolverConfig) -> Result<RunReport, SolverError> {
    run_with(config, RunOptions::default())
}

/// [`run`] with explicit execution options.
///
/// # Errors
///
/// As [`run`].
pub fn run_with(config: &SolverConfig, options: RunOptions) -> Result<RunReport, SolverError> {
    let mut diagonals = RandomDiagonalGenerator::new(config.seed);
    let solver =
        ConjugateGradientSolver::from_config(config).with_row_parallel(options.row_parallel);
    run_custom(config, &mut diagonals, &SineRhs, &solver)
}

/// Run with caller-supplied collaborators.
///
/// # Errors
///
/// As [`run`], plus whatever `solver` reports.
pub fn run_custom<G, R, S>(
    config: &SolverConfig,
    diagonals: &mut G,
    rhs: &R,
    solver: &S,
) -> Result<RunReport, SolverError>
where
    G: DiagonalGenerator + ?Sized,
    R: RhsGenerator + ?Sized,
    S: BandedSolver + ?Sized,
{
    validate_config(config)?;

    info!(
        n = config.n,
        bandwidth = config.bandwidth,
        max_iterations = config.max_iterations,
        tolerance = config.tolerance,
        seed = config.seed,
        solver = solver.name(),
        "starting run"
    );

    let assembly_start = Instant::now();
    let matrix = build_banded_matrix(config.n, config.bandwidth, diagonals)?;
    let assembly_time_ms = assembly_start.elapsed().as_secs_f64() * 1e3;

    let b = rhs.generate(config.n);
    let x0 = AlignedVec::zeroed(config.n);
    debug!(assembly_time_ms, "system ready");

    let audit = AuditBuilder::start(format!("seed-{}", config.seed), &matrix, &b);
    let outcome = solver.solve(&matrix, &b, &x0)?;
    let audit = audit.finish(&outcome, solver.name());

    info!(
        iterations = outcome.iterations,
        termination = %outcome.termination,
        error = outcome.final_error,
        residual = outcome.final_residual_norm,
        "run finished"
    );

    Ok(RunReport {
        config: config.clone(),
        outcome,
        assembly_time_ms,
        simd: kernels::simd_available(),
        audit,
    })
}
