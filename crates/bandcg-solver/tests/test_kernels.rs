//! Integration tests for the vector kernels and banded storage.
//!
//! The banded product is checked against a dense reference built from
//! `BandedMatrix::get`, across lane-width remainders and band widths.

mod helpers;

use approx::assert_relative_eq;
use bandcg_solver::banded::{build_banded_matrix, BandedMatrix};
use bandcg_solver::error::{AssemblyError, SolverError};
use bandcg_solver::generator::RandomDiagonalGenerator;
use bandcg_solver::kernels::{
    add_scaled, axpy, copy, dot, dot_portable, multiply_banded, multiply_banded_portable,
    subtract, xpby, LANES,
};
use bandcg_solver::traits::DiagonalGenerator;

use helpers::{dense_matvec, random_spd_banded, random_vector};

// ---------------------------------------------------------------------------
// Banded product
// ---------------------------------------------------------------------------

#[test]
fn test_matvec_against_dense_all_remainders() {
    // Half bands 1..=9 cover every remainder modulo the lane width.
    for h in 1..=9usize {
        let bw = 2 * h + 1;
        for n in [h + 1, 2 * h + 3, 4 * h + 5, 50] {
            let a = random_spd_banded(n, bw, (n * 31 + h) as u64);
            let v = random_vector(n, h as u64);
            let mut y = vec![0.0; n];
            multiply_banded(&a, &v, &mut y);

            let expected = dense_matvec(&a, &v);
            for i in 0..n {
                assert_relative_eq!(y[i], expected[i], epsilon = 1e-12, max_relative = 1e-12);
            }
        }
    }
}

#[test]
fn test_matvec_symmetric_scatter_reaches_last_row() {
    // Only A[3][5] is stored non-zero: y[5] comes entirely from the scatter
    // of row 3.
    let n = 6;
    let a = BandedMatrix::from_diagonals(
        n,
        5,
        &[vec![0.0; 6], vec![0.0; 5], vec![0.0, 0.0, 0.0, 3.0]],
    )
    .unwrap();
    let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut y = [0.0; 6];
    multiply_banded(&a, &v, &mut y);

    // A[3][5] = A[5][3] = 3.
    assert_eq!(y, [0.0, 0.0, 0.0, 18.0, 0.0, 12.0]);
}

#[test]
fn test_matvec_generated_matrix_matches_portable() {
    let a = build_banded_matrix(333, 41, &mut RandomDiagonalGenerator::new(5)).unwrap();
    let v = random_vector(333, 9);
    let mut fast = vec![0.0; 333];
    let mut portable = vec![0.0; 333];
    multiply_banded(&a, &v, &mut fast);
    multiply_banded_portable(&a, &v, &mut portable);
    assert_eq!(fast, portable);
}

#[test]
fn test_padding_is_zero_and_unread() {
    let a = random_spd_banded(10, 7, 1);
    let h = a.half_band();
    for i in 0..10 {
        let valid = a.row_band(i).len();
        assert_eq!(valid, h.min(9 - i));
        for j in valid..h {
            assert_eq!(a.off_diagonals()[i * h + j], 0.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Vector kernels
// ---------------------------------------------------------------------------

#[test]
fn test_dot_matches_portable_bitwise() {
    for n in 0..(4 * LANES + 3) {
        let a = random_vector(n, n as u64);
        let b = random_vector(n, 1000 + n as u64);
        assert_eq!(dot(&a, &b).to_bits(), dot_portable(&a, &b).to_bits(), "n={n}");
    }
}

#[test]
fn test_cg_update_sequence() {
    let x0 = random_vector(13, 1);
    let v = random_vector(13, 2);
    let z = random_vector(13, 3);

    // x = x + alpha v
    let mut x = x0.clone();
    axpy(0.5, &v, &mut x);
    for i in 0..13 {
        assert_relative_eq!(x[i], x0[i] + 0.5 * v[i], epsilon = 1e-15);
    }

    // r = b - z
    let mut r = vec![0.0; 13];
    subtract(&x0, &z, &mut r);
    for i in 0..13 {
        assert_eq!(r[i], x0[i] - z[i]);
    }

    // v = r + beta v
    let mut dir = v.clone();
    xpby(&r, 0.25, &mut dir);
    let mut expected = vec![0.0; 13];
    add_scaled(&r, &v, 0.25, &mut expected);
    assert_eq!(dir, expected);

    let mut copied = vec![0.0; 13];
    copy(&dir, &mut copied);
    assert_eq!(copied, dir);
}

#[test]
fn test_assembly_rejects_oversized_diagonal_request() {
    let mut gen = RandomDiagonalGenerator::new(1);
    let mut wrapped = |n: usize, k: usize, bw: usize| -> Result<Vec<f64>, AssemblyError> {
        // Ask for one band too many on the last request.
        let k = if k == bw / 2 { k + 1 } else { k };
        gen.generate(n, k, bw)
    };
    let err = build_banded_matrix(20, 5, &mut wrapped).unwrap_err();
    assert!(matches!(
        err,
        SolverError::Assembly(AssemblyError::DiagonalRejected { k: 3, .. })
    ));
}
