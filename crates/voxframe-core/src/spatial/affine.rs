//! Homogeneous 4×4 affine matrix.
//!
//! Maps voxel indices to world (or normalized) coordinates:
//! `y = L · x + t`, with `L` the upper-left 3×3 block and `t` the first three
//! entries of the last column.

use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

use super::{Point3, Vector3};
use crate::error::{GeometryError, Result};
use crate::transform::decompose::{decompose, Decomposition};

/// A 4×4 homogeneous affine transform.
///
/// The bottom row is expected to be `[0, 0, 0, 1]`. This is not enforced on
/// construction; use [`AffineMatrix::is_homogeneous`] to check it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix(pub Matrix4<f64>);

impl AffineMatrix {
    /// Wrap an existing nalgebra matrix.
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Build from row-major nested arrays, `rows[r][c]`.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(Matrix4::from_fn(|r, c| rows[r][c]))
    }

    /// Build from 16 row-major values.
    pub fn from_row_slice(values: &[f64]) -> Result<Self> {
        if values.len() != 16 {
            return Err(GeometryError::dimension_mismatch(16, values.len()));
        }
        Ok(Self(Matrix4::from_row_slice(values)))
    }

    /// Build from a linear part and a translation; the bottom row is `[0, 0, 0, 1]`.
    pub fn from_parts(linear: &Matrix3<f64>, translation: &Vector3) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self(m)
    }

    /// Upper-left 3×3 block.
    pub fn linear_part(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// First three entries of the last column.
    pub fn translation(&self) -> Vector3 {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Row-major copy, `rows[r][c]`.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.0[(r, c)];
            }
        }
        rows
    }

    /// Check that the bottom row is `[0, 0, 0, 1]` within `tolerance`.
    pub fn is_homogeneous(&self, tolerance: f64) -> bool {
        let expected = [0.0, 0.0, 0.0, 1.0];
        (0..4).all(|c| (self.0[(3, c)] - expected[c]).abs() <= tolerance)
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        Point3::from(self.linear_part() * point.coords + self.translation())
    }

    /// `self · other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &AffineMatrix) -> AffineMatrix {
        Self(self.0 * other.0)
    }

    /// Try to compute the inverse transform.
    pub fn try_inverse(&self) -> Option<AffineMatrix> {
        self.0.try_inverse().map(Self)
    }

    /// Factor into start, step and direction cosines. See [`decompose`].
    pub fn decompose(&self) -> Result<Decomposition> {
        decompose(self)
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &Matrix4<f64> {
        &self.0
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix4<f64>> for AffineMatrix {
    fn from(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }
}

impl From<[[f64; 4]; 4]> for AffineMatrix {
    fn from(rows: [[f64; 4]; 4]) -> Self {
        Self::from_rows(rows)
    }
}

impl std::ops::Index<(usize, usize)> for AffineMatrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<(usize, usize)> for AffineMatrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}
