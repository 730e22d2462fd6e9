//! Shared test helpers for the bandcg-solver integration test suite.
//!
//! Provides a deterministic random source, banded matrix fixtures, a dense
//! reference solver and floating-point comparison utilities.

#![allow(dead_code)]

use bandcg_solver::banded::BandedMatrix;

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// Matrix generators
// ---------------------------------------------------------------------------

/// Random symmetric banded matrix with signed off-diagonal entries in
/// `[-1, 1)` and a main diagonal of `1 + sum of |off-diagonals|` per row,
/// so it is strictly diagonally dominant and SPD.
pub fn random_spd_banded(n: usize, bandwidth: usize, seed: u64) -> BandedMatrix {
    let mut rng = Lcg::new(seed);
    let h = bandwidth / 2;

    let mut diagonals: Vec<Vec<f64>> = vec![vec![0.0; n]];
    for k in 1..=h {
        diagonals.push((0..n - k).map(|_| rng.next_f64_range(-1.0, 1.0)).collect());
    }

    let mut row_sums = vec![0.0f64; n];
    for (k, diag) in diagonals.iter().enumerate().skip(1) {
        for (i, &v) in diag.iter().enumerate() {
            row_sums[i] += v.abs();
            row_sums[i + k] += v.abs();
        }
    }
    diagonals[0] = row_sums.iter().map(|s| 1.0 + s).collect();

    BandedMatrix::from_diagonals(n, bandwidth, &diagonals).unwrap()
}

/// Generate a random vector with entries in [-1, 1).
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect()
}

// ---------------------------------------------------------------------------
// Dense reference operations
// ---------------------------------------------------------------------------

/// Dense `A * x`, built from `BandedMatrix::get`, independent of the kernels.
pub fn dense_matvec(matrix: &BandedMatrix, x: &[f64]) -> Vec<f64> {
    matrix
        .to_dense()
        .iter()
        .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
        .collect()
}

/// Solve a small system by Gaussian elimination with partial pivoting.
///
/// # Panics
///
/// Panics if the matrix is singular or dimensions are inconsistent.
pub fn dense_solve(matrix: &BandedMatrix, rhs: &[f64]) -> Vec<f64> {
    let n = matrix.n();
    assert_eq!(rhs.len(), n, "rhs length must match matrix dimension");

    let mut aug: Vec<Vec<f64>> = matrix
        .to_dense()
        .into_iter()
        .zip(rhs)
        .map(|(mut row, &b)| {
            row.push(b);
            row
        })
        .collect();

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        assert!(max_val > 1e-15, "matrix is singular or near-singular");
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }

    x
}

/// Compute the residual `b - A*x` with the dense reference product.
pub fn compute_residual(matrix: &BandedMatrix, x: &[f64], rhs: &[f64]) -> Vec<f64> {
    dense_matvec(matrix, x)
        .iter()
        .zip(rhs)
        .map(|(ax, b)| b - ax)
        .collect()
}

// ---------------------------------------------------------------------------
// Floating-point comparison utilities
// ---------------------------------------------------------------------------

/// Compute the L2 norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Compute the L2 distance between two vectors.
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter()
        .zip(b.iter())
        .map(|(&ai, &bi)| (ai - bi) * (ai - bi))
        .sum::<f64>()
        .sqrt()
}

/// Compute the relative error ||approx - exact|| / ||exact||.
///
/// Returns absolute error if the exact solution has zero norm.
pub fn relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    let exact_norm = l2_norm(exact);
    let error = l2_distance(approx, exact);
    if exact_norm > 1e-15 {
        error / exact_norm
    } else {
        error
    }
}
