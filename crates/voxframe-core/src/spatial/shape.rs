//! Volume extents in (z, y, x) order.

use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, Result};

/// Voxel extents of a volume, stored in array order `(depth, height, width)`.
///
/// Arrays are indexed `[z, y, x]`, so `depth` is the slowest axis and
/// `width` the fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeShape {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl VolumeShape {
    pub fn new(depth: usize, height: usize, width: usize) -> Self {
        Self {
            depth,
            height,
            width,
        }
    }

    /// Build from a dimension slice such as `ndarray::ArrayBase::shape()`.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match *dims {
            [depth, height, width] => Ok(Self::new(depth, height, width)),
            _ => Err(GeometryError::dimension_mismatch(3, dims.len())),
        }
    }

    /// `[depth, height, width]`.
    pub fn to_zyx(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// `[width, height, depth]`, the NIfTI on-disk order.
    pub fn to_xyz(&self) -> [usize; 3] {
        [self.width, self.height, self.depth]
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.depth * self.height * self.width
    }
}

impl From<[usize; 3]> for VolumeShape {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}

impl From<(usize, usize, usize)> for VolumeShape {
    fn from((depth, height, width): (usize, usize, usize)) -> Self {
        Self::new(depth, height, width)
    }
}
