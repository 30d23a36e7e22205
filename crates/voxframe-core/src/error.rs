//! Error types for geometry operations.
//!
//! Failures are surfaced to the caller unchanged; nothing in this crate
//! retries or recovers.

use thiserror::Error;

/// Main error type for affine and coordinate-matrix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// SVD, inversion or input-finiteness failure on a linear part.
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// A volume extent of zero, which would divide by zero.
    #[error("Zero extent along {axis} axis")]
    ZeroExtent {
        axis: &'static str,
    },

    /// Input of the wrong length for the requested matrix or shape.
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

impl GeometryError {
    /// Create a numerical error.
    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::NumericalError(msg.into())
    }

    /// Create a zero-extent error for the named axis.
    pub fn zero_extent(axis: &'static str) -> Self {
        Self::ZeroExtent { axis }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}
