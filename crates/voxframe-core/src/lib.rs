//! Affine geometry for 3D volumes.
//!
//! * [`decompose`] splits a voxel-to-world affine into start, signed step and
//!   direction cosines.
//! * [`create_v2p_matrix`] builds the voxel-to-normalized matrix used by
//!   grid-sampling consumers.
//!
//! Volumes are indexed `[z, y, x]`; affine rows are `(x, y, z)`.

pub mod error;
pub mod spatial;
pub mod transform;

pub use error::{GeometryError, Result};
pub use spatial::{AffineMatrix, Direction, Point3, Vector3, VolumeShape};
pub use transform::{
    create_p2v_matrix, create_v2p_matrix, decompose, decompose_with, voxel_to_normalized_matrix,
    DecomposeOptions, Decomposition,
};
