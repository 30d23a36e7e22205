//! NIfTI volume I/O in `[z, y, x]` array order.
//!
//! Files store voxels as `[x, y, z]`; [`load_volume`] and [`save_volume`]
//! permute between the two so callers always see `[z, y, x]`.

pub mod nifti_io;
pub mod volume;

pub use nifti_io::{
    header_affine, load_volume, load_volume_with, save_volume, save_volume_with, LoadOptions,
    SaveOptions,
};
pub use volume::{Volume, VoxelElement};
