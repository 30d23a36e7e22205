//! Direction type for representing volume orientation.
//!
//! Direction matrices hold the scale-free orientation of the voxel axes in
//! world space.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use super::Vector3;

/// Direction-cosine matrix of a volume.
///
/// Orthonormal 3×3 matrix, possibly improper (det = -1) when the voxel grid
/// is mirrored relative to world space.
///
/// This is a thin wrapper around nalgebra's `Matrix3` to provide
/// domain-specific functionality while keeping all nalgebra operations
/// reachable through [`Direction::inner`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction(pub Matrix3<f64>);

impl Direction {
    /// Create an identity direction matrix (no rotation).
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Check whether `R · Rᵀ` equals the identity within `tolerance`.
    pub fn is_orthogonal(&self, tolerance: f64) -> bool {
        let product = self.0 * self.0.transpose();
        (product - Matrix3::identity()).amax() <= tolerance
    }

    /// Check whether the matrix is a proper rotation (orthogonal, det = 1).
    pub fn is_proper_rotation(&self, tolerance: f64) -> bool {
        self.is_orthogonal(tolerance) && (self.determinant() - 1.0).abs() <= tolerance
    }

    /// Determinant; `±1` for a valid direction matrix.
    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    /// Try to compute the inverse of the direction matrix.
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// The transpose, equal to the inverse for an orthonormal matrix.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Column `i` is the world-space direction of voxel axis `i`.
    pub fn axis_directions(&self) -> [Vector3; 3] {
        [
            self.0.column(0).into_owned(),
            self.0.column(1).into_owned(),
            self.0.column(2).into_owned(),
        ]
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &Matrix3<f64> {
        &self.0
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix3<f64>> for Direction {
    fn from(matrix: Matrix3<f64>) -> Self {
        Self(matrix)
    }
}

impl std::ops::Index<(usize, usize)> for Direction {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Direction {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl std::ops::Mul for Direction {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

impl std::ops::Mul<Vector3> for Direction {
    type Output = Vector3;

    fn mul(self, vector: Vector3) -> Self::Output {
        self.0 * vector
    }
}
