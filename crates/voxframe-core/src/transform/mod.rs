//! Affine factorization and normalized-coordinate matrices.

pub mod decompose;
pub mod normalize;

pub use decompose::{decompose, decompose_with, DecomposeOptions, Decomposition};
pub use normalize::{create_p2v_matrix, create_v2p_matrix, voxel_to_normalized_matrix};
