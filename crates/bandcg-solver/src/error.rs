//! Error types for the solver crate.
//!
//! Configuration problems are caught before anything is allocated, assembly
//! problems are reported by the diagonal generator, and length mismatches are
//! caught at the `solve` boundary. The CG loop itself never fails: running out
//! of iterations is reported through
//! [`Termination::Exhausted`](crate::types::Termination::Exhausted).
//! All errors implement `std::error::Error` via `thiserror`.

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The run configuration is invalid (dimension, bandwidth, limits).
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// One or more diagonals could not be generated; the matrix is unusable.
    #[error("matrix assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// A vector passed to the solver does not match the matrix dimension.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Writing a report to its sink failed.
    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialising a report failed.
    #[error("report serialisation failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors, raised eagerly before any buffer is allocated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The system is smaller than the assembly step supports.
    #[error("dimension n = {n} is too small (minimum {min})")]
    DimensionTooSmall {
        /// Requested dimension.
        n: usize,
        /// Smallest supported dimension.
        min: usize,
    },

    /// Bandwidth must count the main diagonal plus a symmetric pair of bands.
    #[error("bandwidth {bandwidth} must be odd")]
    EvenBandwidth {
        /// Requested bandwidth.
        bandwidth: usize,
    },

    /// Bandwidth may not exceed half the dimension.
    #[error("bandwidth {bandwidth} exceeds n / 2 = {limit} (n = {n})")]
    BandwidthTooLarge {
        /// Requested bandwidth.
        bandwidth: usize,
        /// System dimension.
        n: usize,
        /// Largest allowed bandwidth, `n / 2`.
        limit: usize,
    },

    /// The dimension exceeds the supported maximum.
    #[error("dimension n = {n} exceeds maximum supported {max}")]
    DimensionTooLarge {
        /// Requested dimension.
        n: usize,
        /// Maximum supported dimension.
        max: usize,
    },

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },
}

/// Failures while generating or repacking the matrix diagonals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    /// The generator refused a structurally invalid `(n, k, bandwidth)`.
    #[error("diagonal {k} rejected for n = {n}, bandwidth = {bandwidth}")]
    DiagonalRejected {
        /// System dimension.
        n: usize,
        /// Requested diagonal index.
        k: usize,
        /// Matrix bandwidth.
        bandwidth: usize,
    },

    /// A generated diagonal has the wrong number of entries.
    #[error("diagonal {k} has {actual} entries, expected {expected}")]
    DiagonalLength {
        /// Diagonal index.
        k: usize,
        /// Expected length, `n - k`.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },

    /// The number of supplied diagonals does not match `halfBand + 1`.
    #[error("expected {expected} diagonals, got {actual}")]
    DiagonalCount {
        /// `halfBand + 1`.
        expected: usize,
        /// Number supplied.
        actual: usize,
    },

    /// A generated value is NaN or infinite.
    #[error("non-finite value on diagonal {k} at position {position}")]
    NonFiniteValue {
        /// Diagonal index.
        k: usize,
        /// Offset within the diagonal.
        position: usize,
    },
}
