//! Input validation for assembly and solve.
//!
//! Every check here runs before any buffer is allocated, so a rejected
//! configuration leaves no partial state behind. Failures are reported as
//! [`ConfigError`] (converted into [`SolverError::Config`]) or, for vectors
//! handed to the solver, [`SolverError::DimensionMismatch`].
//!
//! # Limits
//!
//! | Resource             | Limit         | Constant                 |
//! |----------------------|---------------|--------------------------|
//! | Dimension (n)        | 50,000,000    | [`MAX_DIMENSION`]        |
//! | Stored band entries  | 2^30          | [`MAX_BAND_ENTRIES`]     |
//! | Iterations           | 50,000,000    | [`MAX_ITERATIONS`]       |

use crate::banded::BandedMatrix;
use crate::error::{ConfigError, SolverError};
use crate::types::SolverConfig;

// ---------------------------------------------------------------------------
// Resource limits
// ---------------------------------------------------------------------------

/// Smallest dimension the assembly step accepts.
pub const MIN_DIMENSION: usize = 3;

/// Largest supported system dimension.
pub const MAX_DIMENSION: usize = 50_000_000;

/// Upper bound on `n * halfBand`, the compact off-diagonal storage (8 GiB).
pub const MAX_BAND_ENTRIES: usize = 1 << 30;

/// Largest iteration budget accepted.
pub const MAX_ITERATIONS: usize = 50_000_000;

// ---------------------------------------------------------------------------
// Matrix shape
// ---------------------------------------------------------------------------

/// Validate the `(n, bandwidth)` pair for a generated system.
///
/// Checks, in order:
///
/// 1. `bandwidth` is odd (zero counts as even).
/// 2. `n >= MIN_DIMENSION`.
/// 3. `n <= MAX_DIMENSION`.
/// 4. `bandwidth <= n / 2`.
/// 5. `n * halfBand <= MAX_BAND_ENTRIES`.
///
/// # Errors
///
/// Returns the [`ConfigError`] for the first violated rule.
///
/// # Examples
///
/// ```
/// use bandcg_solver::validation::validate_dimensions;
///
/// assert!(validate_dimensions(7, 3).is_ok());
/// assert!(validate_dimensions(7, 4).is_err());
/// assert!(validate_dimensions(7, 5).is_err());
/// ```
pub fn validate_dimensions(n: usize, bandwidth: usize) -> Result<(), ConfigError> {
    if bandwidth % 2 == 0 {
        return Err(ConfigError::EvenBandwidth { bandwidth });
    }

    if n < MIN_DIMENSION {
        return Err(ConfigError::DimensionTooSmall {
            n,
            min: MIN_DIMENSION,
        });
    }

    if n > MAX_DIMENSION {
        return Err(ConfigError::DimensionTooLarge {
            n,
            max: MAX_DIMENSION,
        });
    }

    if bandwidth > n / 2 {
        return Err(ConfigError::BandwidthTooLarge {
            bandwidth,
            n,
            limit: n / 2,
        });
    }

    let band_entries = n.saturating_mul(bandwidth / 2);
    if band_entries > MAX_BAND_ENTRIES {
        return Err(ConfigError::ParameterOutOfRange {
            name: "n * halfBand".into(),
            value: band_entries.to_string(),
            expected: format!("<= {MAX_BAND_ENTRIES}"),
        });
    }

    Ok(())
}

/// Structural check for hand-built matrices: odd bandwidth whose bands fit
/// inside an `n x n` matrix. Looser than [`validate_dimensions`].
pub(crate) fn validate_band_shape(n: usize, bandwidth: usize) -> Result<(), ConfigError> {
    if bandwidth % 2 == 0 {
        return Err(ConfigError::EvenBandwidth { bandwidth });
    }

    let half_band = bandwidth / 2;
    if half_band > 0 && half_band >= n {
        return Err(ConfigError::ParameterOutOfRange {
            name: "bandwidth".into(),
            value: bandwidth.to_string(),
            expected: format!("odd and at most 2n - 1 = {}", (2 * n).saturating_sub(1)),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Solver parameters
// ---------------------------------------------------------------------------

/// Validate convergence parameters.
///
/// # Rules
///
/// - `tolerance` must not be NaN. Any value `<= 0` (including the `-1`
///   "unset" default) is accepted and disables early convergence.
/// - `max_iterations` must be at most [`MAX_ITERATIONS`]. Zero is accepted
///   and runs no iterations.
///
/// # Errors
///
/// Returns [`ConfigError::ParameterOutOfRange`] for the offending parameter.
pub fn validate_params(tolerance: f64, max_iterations: usize) -> Result<(), ConfigError> {
    if tolerance.is_nan() {
        return Err(ConfigError::ParameterOutOfRange {
            name: "tolerance".into(),
            value: tolerance.to_string(),
            expected: "a number (<= 0 disables early convergence)".into(),
        });
    }

    if max_iterations > MAX_ITERATIONS {
        return Err(ConfigError::ParameterOutOfRange {
            name: "max_iterations".into(),
            value: max_iterations.to_string(),
            expected: format!("[0, {MAX_ITERATIONS}]"),
        });
    }

    Ok(())
}

/// Validate a complete run configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError`] from [`validate_dimensions`] or
/// [`validate_params`].
pub fn validate_config(config: &SolverConfig) -> Result<(), ConfigError> {
    validate_dimensions(config.n, config.bandwidth)?;
    validate_params(config.tolerance, config.max_iterations)
}

// ---------------------------------------------------------------------------
// Solve inputs
// ---------------------------------------------------------------------------

/// Validate that `rhs` and `initial` match the matrix dimension.
///
/// Non-finite entries are logged at `warn` level but not rejected: the loop
/// runs with whatever values it is given.
///
/// # Errors
///
/// Returns [`SolverError::DimensionMismatch`] on a length mismatch.
pub fn validate_system(
    matrix: &BandedMatrix,
    rhs: &[f64],
    initial: &[f64],
) -> Result<(), SolverError> {
    let n = matrix.n();

    if rhs.len() != n {
        return Err(SolverError::DimensionMismatch(format!(
            "rhs length {} does not match matrix dimension {}",
            rhs.len(),
            n,
        )));
    }

    if initial.len() != n {
        return Err(SolverError::DimensionMismatch(format!(
            "initial guess length {} does not match matrix dimension {}",
            initial.len(),
            n,
        )));
    }

    if let Some(i) = rhs.iter().position(|v| !v.is_finite()) {
        tracing::warn!(index = i, value = rhs[i], "non-finite rhs entry");
    }
    if let Some(i) = initial.iter().position(|v| !v.is_finite()) {
        tracing::warn!(index = i, value = initial[i], "non-finite initial guess entry");
    }

    Ok(())
}
