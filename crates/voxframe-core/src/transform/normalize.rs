//! Voxel-index to normalized-coordinate matrices.
//!
//! Grid-sampling consumers address a volume in `[-1, 1]` per axis, with
//! `-1` and `+1` at the outer edges of the first and last voxel (the
//! half-voxel-centered convention). Matrix rows are in `(x, y, z)` order
//! while [`VolumeShape`] is `(z, y, x)`, so row `i` uses extent `shape[2 - i]`.

use nalgebra::{Matrix4, Vector3, Vector4};

use crate::error::{GeometryError, Result};
use crate::spatial::{AffineMatrix, VolumeShape};

/// Extents in matrix-row order `(x, y, z)`, as `f64`.
fn row_extents(shape: VolumeShape) -> Result<Vector3<f64>> {
    let axes = [
        (shape.width, "width"),
        (shape.height, "height"),
        (shape.depth, "depth"),
    ];
    let mut extents = Vector3::zeros();
    for (i, (extent, name)) in axes.into_iter().enumerate() {
        if extent == 0 {
            return Err(GeometryError::zero_extent(name));
        }
        extents[i] = extent as f64;
    }
    Ok(extents)
}

/// Build the voxel-to-normalized matrix for a `(depth, height, width)` shape.
///
/// `M[i][i] = 2 / n_i` and `M[i][3] = 1 / n_i - 1`, with `n_0 = width`,
/// `n_1 = height`, `n_2 = depth`.
///
/// # Errors
/// [`GeometryError::ZeroExtent`] if any extent is zero.
pub fn create_v2p_matrix(shape: impl Into<VolumeShape>) -> Result<AffineMatrix> {
    let n = row_extents(shape.into())?;

    let mut m = Matrix4::from_diagonal(&Vector4::new(2.0 / n.x, 2.0 / n.y, 2.0 / n.z, 1.0));
    for i in 0..3 {
        m[(i, 3)] = 1.0 / n[i] - 1.0;
    }
    Ok(AffineMatrix(m))
}

/// Alias of [`create_v2p_matrix`].
pub fn voxel_to_normalized_matrix(shape: impl Into<VolumeShape>) -> Result<AffineMatrix> {
    create_v2p_matrix(shape)
}

/// Inverse of [`create_v2p_matrix`]: normalized coordinates back to voxel indices.
///
/// `M[i][i] = n_i / 2` and `M[i][3] = (n_i - 1) / 2`.
pub fn create_p2v_matrix(shape: impl Into<VolumeShape>) -> Result<AffineMatrix> {
    let n = row_extents(shape.into())?;

    let mut m = Matrix4::from_diagonal(&Vector4::new(n.x / 2.0, n.y / 2.0, n.z / 2.0, 1.0));
    for i in 0..3 {
        m[(i, 3)] = (n[i] - 1.0) / 2.0;
    }
    Ok(AffineMatrix(m))
}
