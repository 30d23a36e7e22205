//! In-memory volumes and the voxel types that can be written to NIfTI.

use std::path::Path;

use anyhow::{anyhow, Result};
use ndarray::Array3;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use voxframe_core::{AffineMatrix, VolumeShape};

mod sealed {
    pub trait Sealed {}
}

/// Sample types accepted by [`crate::save_volume`].
pub trait VoxelElement: sealed::Sealed + Copy + 'static {
    #[doc(hidden)]
    fn write_nifti(path: &Path, header: &NiftiHeader, data: &Array3<Self>) -> Result<()>;
}

macro_rules! impl_voxel_element {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl VoxelElement for $t {
                fn write_nifti(path: &Path, header: &NiftiHeader, data: &Array3<Self>) -> Result<()> {
                    WriterOptions::new(path)
                        .reference_header(header)
                        .write_nifti(data)
                        .map_err(|e| anyhow!("Failed to write NIfTI file: {}", e))
                }
            }
        )*
    };
}

impl_voxel_element!(u8, i16, f32, f64);

/// A loaded volume, indexed `[z, y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Volume {
    Float(Array3<f64>),
    /// Samples cast with `as u8` (truncated toward zero, saturating).
    Byte(Array3<u8>),
}

impl Volume {
    /// Extents as `(depth, height, width)`.
    pub fn shape(&self) -> VolumeShape {
        let dim = match self {
            Volume::Float(data) => data.dim(),
            Volume::Byte(data) => data.dim(),
        };
        VolumeShape::from(dim)
    }

    pub fn as_float(&self) -> Option<&Array3<f64>> {
        match self {
            Volume::Float(data) => Some(data),
            Volume::Byte(_) => None,
        }
    }

    pub fn as_byte(&self) -> Option<&Array3<u8>> {
        match self {
            Volume::Byte(data) => Some(data),
            Volume::Float(_) => None,
        }
    }

    /// Convert to `f64` samples regardless of variant.
    pub fn into_float(self) -> Array3<f64> {
        match self {
            Volume::Float(data) => data,
            Volume::Byte(data) => data.mapv(f64::from),
        }
    }

    /// Write with the default [`crate::SaveOptions`].
    pub fn save<P: AsRef<Path>>(&self, path: P, affine: &AffineMatrix) -> Result<()> {
        match self {
            Volume::Float(data) => crate::save_volume(path, data, affine),
            Volume::Byte(data) => crate::save_volume(path, data, affine),
        }
    }
}

impl From<Array3<f64>> for Volume {
    fn from(data: Array3<f64>) -> Self {
        Volume::Float(data)
    }
}

impl From<Array3<u8>> for Volume {
    fn from(data: Array3<u8>) -> Self {
        Volume::Byte(data)
    }
}
