//! Compact storage for symmetric banded matrices.
//!
//! A symmetric matrix with bandwidth `w` has `h = (w - 1) / 2` off-diagonal
//! bands on each side of the main diagonal. Only the main diagonal and the
//! upper bands are stored:
//!
//! ```text
//! main[i]          = A[i][i]                       (n values)
//! off[i * h + j]   = A[i][i + j + 1] = A[i + j + 1][i]   for j in 0..h
//! ```
//!
//! Row `i` of `off` therefore holds the upper band entries of row `i` left to
//! right. Slots with `i + j + 1 >= n` fall outside the matrix; they are kept
//! as zero padding and never read by the kernels.

use std::time::Instant;

use tracing::debug;

use crate::aligned::AlignedVec;
use crate::error::{AssemblyError, SolverError};
use crate::traits::DiagonalGenerator;
use crate::validation::validate_dimensions;

/// Symmetric banded matrix in compact row-major band storage.
///
/// Immutable once assembled. Both buffers are [`AlignedVec`]s and are freed
/// when the matrix is dropped.
#[derive(Clone, PartialEq)]
pub struct BandedMatrix {
    n: usize,
    bandwidth: usize,
    half_band: usize,
    main: AlignedVec,
    off: AlignedVec,
}

impl BandedMatrix {
    /// Build a matrix from per-diagonal arrays.
    ///
    /// `diagonals[0]` is the main diagonal (length `n`) and `diagonals[k]`
    /// for `k` in `1..=h` is the `k`-th upper diagonal (length `n - k`). The
    /// diagonals are repacked into the row-major band layout.
    ///
    /// Only structural checks are made here; the dimension rules for
    /// generated systems live in [`build_banded_matrix`].
    ///
    /// # Errors
    ///
    /// - [`SolverError::Config`] if `bandwidth` is even or reaches past the
    ///   matrix (`h >= n` for `n > 0`).
    /// - [`SolverError::Assembly`] if the diagonal count, a diagonal length,
    ///   or a value is invalid.
    pub fn from_diagonals(
        n: usize,
        bandwidth: usize,
        diagonals: &[Vec<f64>],
    ) -> Result<Self, SolverError> {
        crate::validation::validate_band_shape(n, bandwidth)?;
        let half_band = bandwidth / 2;

        if diagonals.len() != half_band + 1 {
            return Err(AssemblyError::DiagonalCount {
                expected: half_band + 1,
                actual: diagonals.len(),
            }
            .into());
        }

        for (k, diag) in diagonals.iter().enumerate() {
            let expected = n - k;
            if diag.len() != expected {
                return Err(AssemblyError::DiagonalLength {
                    k,
                    expected,
                    actual: diag.len(),
                }
                .into());
            }
            if let Some(position) = diag.iter().position(|v| !v.is_finite()) {
                return Err(AssemblyError::NonFiniteValue { k, position }.into());
            }
        }

        let main = AlignedVec::from_slice(&diagonals[0]);
        let mut off = AlignedVec::zeroed(n * half_band);

        // Transpose: diagonal k, position i  ->  row i, band slot k - 1.
        for (k, diag) in diagonals.iter().enumerate().skip(1) {
            for (i, &value) in diag.iter().enumerate() {
                off[i * half_band + (k - 1)] = value;
            }
        }

        Ok(Self {
            n,
            bandwidth,
            half_band,
            main,
            off,
        })
    }

    /// System dimension `n`.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Total number of bands (odd).
    #[inline]
    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// Number of stored off-diagonal bands, `(bandwidth - 1) / 2`.
    #[inline]
    pub fn half_band(&self) -> usize {
        self.half_band
    }

    /// Main diagonal, `A[i][i]`.
    #[inline]
    pub fn main_diagonal(&self) -> &[f64] {
        &self.main
    }

    /// The full compact band buffer including boundary padding.
    #[inline]
    pub fn off_diagonals(&self) -> &[f64] {
        &self.off
    }

    /// In-range upper band entries of row `i`: `A[i][i+1..=i+len]` with
    /// `len = min(h, n - 1 - i)`. Padding is excluded.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n`.
    #[inline]
    pub fn row_band(&self, i: usize) -> &[f64] {
        assert!(i < self.n, "row {i} out of bounds for n = {}", self.n);
        let len = self.half_band.min(self.n - 1 - i);
        let start = i * self.half_band;
        &self.off[start..start + len]
    }

    /// Entry `A[i][j]`, read from the single stored value for either
    /// triangle. Zero outside the band.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n` or `j >= n`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "({i}, {j}) out of bounds for n = {}", self.n);
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        let d = hi - lo;
        if d == 0 {
            self.main[lo]
        } else if d <= self.half_band {
            self.off[lo * self.half_band + d - 1]
        } else {
            0.0
        }
    }

    /// Number of stored in-range entries (main diagonal plus upper bands).
    pub fn stored_entries(&self) -> usize {
        self.n + (1..=self.half_band).map(|k| self.n - k).sum::<usize>()
    }

    /// Expand into a dense row-major `n x n` matrix. Intended for tests and
    /// diagnostics on small systems.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.get(i, j)).collect())
            .collect()
    }

    /// `true` when `|A[i][i]| > sum_{j != i} |A[i][j]|` for every row.
    pub fn is_diagonally_dominant(&self) -> bool {
        let mut off_sums = vec![0.0f64; self.n];
        for i in 0..self.n {
            for (j, &a) in self.row_band(i).iter().enumerate() {
                off_sums[i] += a.abs();
                off_sums[i + j + 1] += a.abs();
            }
        }
        self.main
            .iter()
            .zip(&off_sums)
            .all(|(&d, &s)| d.abs() > s)
    }
}

impl std::fmt::Debug for BandedMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandedMatrix")
            .field("n", &self.n)
            .field("bandwidth", &self.bandwidth)
            .field("half_band", &self.half_band)
            .finish_non_exhaustive()
    }
}

/// Assemble a banded matrix from a diagonal generator.
///
/// Validates `(n, bandwidth)` first (odd bandwidth, `n >= 3`,
/// `bandwidth <= n / 2`) so that no diagonal is requested for an invalid
/// configuration. Then requests diagonals `0..=h` from `generator` and
/// repacks them into band storage.
///
/// # Errors
///
/// - [`SolverError::Config`] for an invalid configuration.
/// - [`SolverError::Assembly`] if any diagonal request fails or returns
///   malformed data. Every diagonal is requested even after a failure and
///   the first failure is returned.
///
/// # Example
///
/// ```
/// use bandcg_solver::banded::build_banded_matrix;
/// use bandcg_solver::generator::RandomDiagonalGenerator;
///
/// let mut gen = RandomDiagonalGenerator::new(7);
/// let a = build_banded_matrix(16, 5, &mut gen).unwrap();
/// assert_eq!(a.half_band(), 2);
/// assert!(a.is_diagonally_dominant());
/// ```
pub fn build_banded_matrix<G>(
    n: usize,
    bandwidth: usize,
    generator: &mut G,
) -> Result<BandedMatrix, SolverError>
where
    G: DiagonalGenerator + ?Sized,
{
    validate_dimensions(n, bandwidth)?;

    let start = Instant::now();
    let half_band = bandwidth / 2;

    let mut diagonals = Vec::with_capacity(half_band + 1);
    let mut first_error: Option<AssemblyError> = None;

    for k in 0..=half_band {
        match generator.generate(n, k, bandwidth) {
            Ok(diag) => diagonals.push(diag),
            Err(e) => {
                debug!(k, error = %e, "diagonal generation failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e.into());
    }

    let matrix = BandedMatrix::from_diagonals(n, bandwidth, &diagonals)?;

    debug!(
        n,
        bandwidth,
        stored = matrix.stored_entries(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "banded matrix assembled"
    );

    Ok(matrix)
}
