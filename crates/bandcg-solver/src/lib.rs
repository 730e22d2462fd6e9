//! Conjugate gradient solver for large symmetric banded systems.
//!
//! Solves `Ax = b` where `A` is symmetric positive-definite and banded. Only
//! the main diagonal and the upper bands are stored; the matrix-vector
//! product applies each stored entry to both triangles.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`banded`] | compact band storage and assembly from generated diagonals |
//! | [`kernels`] | lane-blocked vector kernels, optional AVX2 + FMA and rayon paths |
//! | [`cg`] | the CG loop with its exact-residual refresh policy |
//! | [`generator`] | seeded diagonal generator and closed-form rhs |
//! | [`driver`] | one end-to-end run from a [`SolverConfig`](types::SolverConfig) |
//! | [`report`] | text and JSON reports |
//!
//! # Features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `simd` | AVX2 + FMA kernels on x86_64, chosen at runtime |
//! | `parallel` | row-striped matrix-vector product on rayon |
//!
//! Serial results are bit-identical with and without `simd`.
//!
//! # Example
//!
//! ```rust
//! use bandcg_solver::banded::build_banded_matrix;
//! use bandcg_solver::cg::solve;
//! use bandcg_solver::generator::{RandomDiagonalGenerator, SineRhs};
//! use bandcg_solver::traits::RhsGenerator;
//!
//! let mut gen = RandomDiagonalGenerator::new(20162);
//! let a = build_banded_matrix(100, 7, &mut gen).unwrap();
//! let b = SineRhs.generate(100);
//!
//! let outcome = solve(&a, &b, &vec![0.0; 100], 1e-8, 100).unwrap();
//! assert!(outcome.converged());
//! assert_eq!(outcome.iterations, outcome.log.len());
//! ```

pub mod aligned;
pub mod audit;
pub mod banded;
pub mod cg;
pub mod driver;
pub mod error;
pub mod generator;
pub mod kernels;
pub mod report;
pub mod traits;
pub mod types;
pub mod validation;

pub use banded::{build_banded_matrix, BandedMatrix};
pub use cg::{solve, ConjugateGradientSolver};
pub use error::{AssemblyError, ConfigError, SolverError};
pub use types::{IterationEntry, IterationLog, SolveOutcome, SolverConfig, Termination};
