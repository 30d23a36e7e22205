//! Decomposition of an affine matrix into start, step and direction cosines.
//!
//! Given the linear part `L = U Σ Vᵀ`, the direction cosines are the
//! orthogonal polar factor `R = U Vᵀ` (scale removed, reflections kept).
//! The signed per-axis step is `diag(L · R⁻¹)` and the start is the
//! translation expressed in the rotated basis, `tᵀ · R⁻¹`.
//!
//! Off-diagonal terms of `L · R⁻¹` (shear, or anisotropic scale along
//! rotated axes) are dropped.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{GeometryError, Result};
use crate::spatial::{AffineMatrix, Direction, Vector3};

/// Options for [`decompose_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposeOptions {
    /// Relative threshold below which the smallest singular value counts as
    /// zero. `0.0` (the default) disables the check, so rank-deficient linear
    /// parts still decompose.
    pub singular_tolerance: f64,
    /// Iteration cap for the SVD.
    pub max_svd_iterations: usize,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            singular_tolerance: 0.0,
            max_svd_iterations: 1000,
        }
    }
}

impl DecomposeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative singular-value threshold.
    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_tolerance = tolerance;
        self
    }

    /// Set the SVD iteration cap.
    pub fn with_max_svd_iterations(mut self, iterations: usize) -> Self {
        self.max_svd_iterations = iterations;
        self
    }
}

/// Result of [`decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// World location of voxel `(0, 0, 0)` in the rotated frame.
    pub start: Vector3,
    /// Signed voxel spacing per axis.
    pub step: Vector3,
    /// Orthonormal direction cosines.
    pub direction: Direction,
}

impl Decomposition {
    /// Rebuild an affine as `[R · diag(step) | Rᵀ · start]`.
    ///
    /// Exact whenever `L · Rᵀ` of the source matrix was diagonal.
    pub fn to_affine(&self) -> AffineMatrix {
        let r = self.direction.0;
        let linear = r * Matrix3::from_diagonal(&self.step);
        let translation = r.transpose() * self.start;
        AffineMatrix::from_parts(&linear, &translation)
    }

    /// `(start, step, direction_cosines)`.
    pub fn into_parts(self) -> (Vector3, Vector3, Direction) {
        (self.start, self.step, self.direction)
    }
}

/// Factor `aff` into start, step and direction cosines with default options.
pub fn decompose(aff: &AffineMatrix) -> Result<Decomposition> {
    decompose_with(aff, &DecomposeOptions::default())
}

/// Factor `aff` into start, step and direction cosines.
///
/// # Errors
/// [`GeometryError::NumericalError`] if the linear part or translation is
/// not finite, the SVD does not converge, the direction matrix cannot be
/// inverted, or (only with a positive `options.singular_tolerance`) the
/// linear part is singular relative to that tolerance.
///
/// A rank-deficient linear part is not an error by default: `U Vᵀ` is still
/// orthonormal, and the step along the degenerate axis comes out as zero.
pub fn decompose_with(aff: &AffineMatrix, options: &DecomposeOptions) -> Result<Decomposition> {
    let linear = aff.linear_part();
    let translation = aff.translation();

    if linear.iter().chain(translation.iter()).any(|v| !v.is_finite()) {
        return Err(GeometryError::numerical("affine contains non-finite values"));
    }

    let svd = linear
        .try_svd(true, true, f64::EPSILON, options.max_svd_iterations)
        .ok_or_else(|| GeometryError::numerical("SVD of linear part did not converge"))?;

    let sigma_max = svd.singular_values.max();
    let sigma_min = svd.singular_values.min();
    trace!(
        singular_values = ?svd.singular_values.as_slice(),
        condition = sigma_max / sigma_min,
        "decomposing affine"
    );
    if options.singular_tolerance > 0.0 && sigma_min <= options.singular_tolerance * sigma_max {
        return Err(GeometryError::numerical(format!(
            "singular linear part (singular values {:?})",
            svd.singular_values.as_slice()
        )));
    }

    let u = svd
        .u
        .ok_or_else(|| GeometryError::numerical("SVD did not produce U"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| GeometryError::numerical("SVD did not produce Vᵀ"))?;

    let direction = u * v_t;
    let inverse = direction
        .try_inverse()
        .ok_or_else(|| GeometryError::numerical("singular direction matrix"))?;

    let step = (linear * inverse).diagonal();
    let start = (translation.transpose() * inverse).transpose();

    Ok(Decomposition {
        start,
        step,
        direction: Direction(direction),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    fn assert_close(a: &Vector3, b: &Vector3, tol: f64) {
        assert!((a - b).amax() < tol, "expected {:?}, got {:?}", b, a);
    }

    #[test]
    fn test_decompose_identity() {
        let d = decompose(&AffineMatrix::identity()).unwrap();
        assert_close(&d.start, &Vector3::zeros(), 1e-12);
        assert_close(&d.step, &Vector3::new(1.0, 1.0, 1.0), 1e-12);
        assert!((d.direction.0 - Matrix3::identity()).amax() < 1e-12);
    }

    #[test]
    fn test_decompose_pure_scaling() {
        let aff = AffineMatrix::new(Matrix4::from_diagonal(&nalgebra::Vector4::new(
            2.0, 3.0, 4.0, 1.0,
        )));
        let d = decompose(&aff).unwrap();
        assert_close(&d.step, &Vector3::new(2.0, 3.0, 4.0), 1e-12);
        assert_close(&d.start, &Vector3::zeros(), 1e-12);
        assert!((d.direction.0 - Matrix3::identity()).amax() < 1e-12);
    }

    #[test]
    fn test_decompose_flipped_axis_keeps_reflection_in_direction() {
        let linear = Matrix3::from_diagonal(&Vector3::new(-2.0, 3.0, 4.0));
        let aff = AffineMatrix::from_parts(&linear, &Vector3::new(5.0, -6.0, 7.0));
        let d = decompose(&aff).unwrap();

        assert!((d.direction.determinant() + 1.0).abs() < 1e-12);
        assert_close(&d.step, &Vector3::new(2.0, 3.0, 4.0), 1e-12);
        // start = R · t with R = diag(-1, 1, 1)
        assert_close(&d.start, &Vector3::new(-5.0, -6.0, 7.0), 1e-12);
        assert!((d.to_affine().0 - aff.0).amax() < 1e-12);
    }

    #[test]
    fn test_decompose_zero_thickness_slice() {
        // 2D slice stored as 3D with pixdim z = 0
        let linear = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0));
        let aff = AffineMatrix::from_parts(&linear, &Vector3::new(4.0, 5.0, 6.0));
        let d = decompose(&aff).unwrap();

        assert!(d.direction.is_orthogonal(1e-10));
        assert_close(&d.step, &Vector3::new(1.0, 1.0, 0.0), 1e-12);
        assert!((d.start.x - 4.0).abs() < 1e-12);
        assert!((d.start.y - 5.0).abs() < 1e-12);
        // the null-space axis sign is not fixed by the SVD
        assert!((d.start.z.abs() - 6.0).abs() < 1e-12);
        assert!((d.direction.0.transpose() * d.start - aff.translation()).amax() < 1e-12);
    }

    #[test]
    fn test_decompose_rejects_non_finite() {
        let mut aff = AffineMatrix::identity();
        aff[(1, 3)] = f64::NAN;
        assert!(matches!(
            decompose(&aff),
            Err(GeometryError::NumericalError(_))
        ));
    }

    #[test]
    fn test_decompose_options_tolerance() {
        let linear = Matrix3::from_diagonal(&Vector3::new(1.0, 1e-6, 1.0));
        let aff = AffineMatrix::from_parts(&linear, &Vector3::zeros());
        assert!(decompose(&aff).is_ok());

        let strict = DecomposeOptions::new().with_singular_tolerance(1e-3);
        assert!(matches!(
            decompose_with(&aff, &strict),
            Err(GeometryError::NumericalError(_))
        ));

        let singular = AffineMatrix::from_parts(
            &Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0)),
            &Vector3::zeros(),
        );
        assert!(decompose(&singular).is_ok());
        assert!(decompose_with(&singular, &strict).is_err());
    }
}
