use anyhow::{bail, Context, Result};
use nalgebra::{Matrix3, Matrix4};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;
use tracing::{debug, warn};
use voxframe_core::{decompose, AffineMatrix};

use crate::volume::{Volume, VoxelElement};

/// `NIFTI_XFORM_ALIGNED_ANAT`
const XFORM_ALIGNED_ANAT: i16 = 2;

/// Options for [`load_volume_with`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Cast samples to `u8` after scaling. The cast truncates toward zero and
    /// saturates at 0 and 255; out-of-range samples do not wrap around.
    pub as_byte: bool,
}

impl LoadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a [`Volume::Byte`] instead of [`Volume::Float`].
    pub fn with_as_byte(mut self, as_byte: bool) -> Self {
        self.as_byte = as_byte;
        self
    }
}

/// Options for [`save_volume_with`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Code stored in `sform_code`. Zero marks the sform as unused.
    pub sform_code: i16,
    /// Code stored in `qform_code`. Zero marks the qform as unused.
    pub qform_code: i16,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            sform_code: XFORM_ALIGNED_ANAT,
            qform_code: XFORM_ALIGNED_ANAT,
        }
    }
}

impl SaveOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stored `sform_code`.
    pub fn with_sform_code(mut self, code: i16) -> Self {
        self.sform_code = code;
        self
    }

    /// Set the stored `qform_code`.
    pub fn with_qform_code(mut self, code: i16) -> Self {
        self.qform_code = code;
        self
    }
}

/// Voxel-to-world affine from a header: sform, then qform, then pixdim.
///
/// The pixdim fallback is a plain diagonal with zero translation; unlike
/// nibabel's base affine it neither flips x nor centres the volume.
pub fn header_affine(header: &NiftiHeader) -> AffineMatrix {
    let rows: [[f32; 4]; 4] = if header.sform_code > 0 {
        [
            header.srow_x,
            header.srow_y,
            header.srow_z,
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else if header.qform_code > 0 {
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b*b + c*c + d*d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };

        let r11 = a*a + b*b - c*c - d*d;
        let r12 = 2.0*b*c - 2.0*a*d;
        let r13 = 2.0*b*d + 2.0*a*c;

        let r21 = 2.0*b*c + 2.0*a*d;
        let r22 = a*a + c*c - b*b - d*d;
        let r23 = 2.0*c*d - 2.0*a*b;

        let r31 = 2.0*b*d - 2.0*a*c;
        let r32 = 2.0*c*d + 2.0*a*b;
        let r33 = a*a + d*d - c*c - b*b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11*dx, r12*dy, r13*dz, header.quatern_x],
            [r21*dx, r22*dy, r23*dz, header.quatern_y],
            [r31*dx, r32*dy, r33*dz, header.quatern_z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else {
        warn!("NIfTI header has neither sform nor qform; using pixdim scaling");
        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3];
        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    };

    AffineMatrix::new(Matrix4::from_fn(|r, c| f64::from(rows[r][c])))
}

/// Quaternion `(a, b, c, d)` of a proper rotation, with `a >= 0`.
fn rotation_to_quaternion(r: &Matrix3<f64>) -> [f64; 4] {
    let (r11, r12, r13) = (r[(0, 0)], r[(0, 1)], r[(0, 2)]);
    let (r21, r22, r23) = (r[(1, 0)], r[(1, 1)], r[(1, 2)]);
    let (r31, r32, r33) = (r[(2, 0)], r[(2, 1)], r[(2, 2)]);

    let trace = 1.0 + r11 + r22 + r33;
    let (a, b, c, d) = if trace > 0.5 {
        let a = 0.5 * trace.sqrt();
        (a, 0.25 * (r32 - r23) / a, 0.25 * (r13 - r31) / a, 0.25 * (r21 - r12) / a)
    } else {
        let xd = 1.0 + r11 - (r22 + r33);
        let yd = 1.0 + r22 - (r11 + r33);
        let zd = 1.0 + r33 - (r11 + r22);
        if xd > 1.0 {
            let b = 0.5 * xd.sqrt();
            (0.25 * (r32 - r23) / b, b, 0.25 * (r12 + r21) / b, 0.25 * (r13 + r31) / b)
        } else if yd > 1.0 {
            let c = 0.5 * yd.sqrt();
            (0.25 * (r13 - r31) / c, 0.25 * (r12 + r21) / c, c, 0.25 * (r23 + r32) / c)
        } else {
            let d = 0.5 * zd.sqrt();
            (0.25 * (r21 - r12) / d, 0.25 * (r13 + r31) / d, 0.25 * (r23 + r32) / d, d)
        }
    };

    if a < 0.0 {
        [-a, -b, -c, -d]
    } else {
        [a, b, c, d]
    }
}

/// Header carrying `affine` in its sform and qform, with pixdim set to the
/// voxel sizes.
///
/// The qform rotation is the polar factor of the linear part; an improper
/// one is stored as a proper rotation with `qfac = pixdim[0] = -1`.
fn header_for_affine(affine: &AffineMatrix, options: &SaveOptions) -> NiftiHeader {
    let m = affine.inner();
    let row = |r: usize| {
        [
            m[(r, 0)] as f32,
            m[(r, 1)] as f32,
            m[(r, 2)] as f32,
            m[(r, 3)] as f32,
        ]
    };

    let mut header = NiftiHeader::default();
    header.srow_x = row(0);
    header.srow_y = row(1);
    header.srow_z = row(2);
    header.sform_code = options.sform_code;

    let linear = affine.linear_part();
    header.pixdim[0] = 1.0;
    for axis in 0..3 {
        header.pixdim[axis + 1] = linear.column(axis).norm() as f32;
    }

    header.qform_code = 0;
    if options.qform_code > 0 {
        match decompose(affine) {
            Ok(decomposition) => {
                let mut rotation = decomposition.direction.0;
                if decomposition.direction.determinant() < 0.0 {
                    rotation.column_mut(2).neg_mut();
                    header.pixdim[0] = -1.0;
                }
                let [_, b, c, d] = rotation_to_quaternion(&rotation);
                header.quatern_b = b as f32;
                header.quatern_c = c as f32;
                header.quatern_d = d as f32;
                header.quatern_x = m[(0, 3)] as f32;
                header.quatern_y = m[(1, 3)] as f32;
                header.quatern_z = m[(2, 3)] as f32;
                header.qform_code = options.qform_code;
            }
            Err(e) => warn!("Not writing qform: {}", e),
        }
    }
    header
}

/// Drop trailing singleton axes (e.g. a 4D file with one time point).
fn squeeze_to_3d(mut array: ArrayD<f64>) -> Result<Array3<f64>> {
    if array.ndim() < 3 {
        bail!("Expected 3D NIfTI volume, found {} dimensions", array.ndim());
    }
    while array.ndim() > 3 {
        let last = array.ndim() - 1;
        if array.len_of(Axis(last)) != 1 {
            bail!(
                "Expected 3D NIfTI volume, found shape {:?}",
                array.shape()
            );
        }
        array = array.index_axis_move(Axis(last), 0);
    }
    Ok(array.into_dimensionality::<Ix3>()?)
}

/// Load a NIfTI volume as `f64` samples indexed `[z, y, x]`.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<(Array3<f64>, AffineMatrix)> {
    let (volume, affine) = load_volume_with(path, &LoadOptions::default())?;
    Ok((volume.into_float(), affine))
}

/// Load a NIfTI volume indexed `[z, y, x]`, together with its voxel-to-world affine.
///
/// The file stores `[x, y, z]`; the array is permuted and made contiguous.
/// The affine is unchanged and still maps `(x, y, z)` indices to world space.
pub fn load_volume_with<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<(Volume, AffineMatrix)> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let affine = header_affine(obj.header());

    // Scaling (scl_slope / scl_inter) is applied here.
    let xyz = obj
        .into_volume()
        .into_ndarray::<f64>()
        .context("Failed to convert volume to ndarray")?;
    let xyz = squeeze_to_3d(xyz).with_context(|| format!("Unsupported volume in {}", path.display()))?;

    let zyx = xyz.permuted_axes([2, 1, 0]).as_standard_layout().into_owned();
    debug!(path = %path.display(), shape = ?zyx.dim(), as_byte = options.as_byte, "loaded NIfTI volume");

    let volume = if options.as_byte {
        Volume::Byte(zyx.mapv(|v| v as u8))
    } else {
        Volume::Float(zyx)
    };
    Ok((volume, affine))
}

/// Write a `[z, y, x]` volume with the default [`SaveOptions`].
pub fn save_volume<T: VoxelElement, P: AsRef<Path>>(
    path: P,
    volume: &Array3<T>,
    affine: &AffineMatrix,
) -> Result<()> {
    save_volume_with(path, volume, affine, &SaveOptions::default())
}

/// Write a `[z, y, x]` volume to NIfTI.
///
/// The array is permuted to the on-disk `[x, y, z]` order. A `.nii.gz`
/// extension produces a gzip-compressed file.
pub fn save_volume_with<T: VoxelElement, P: AsRef<Path>>(
    path: P,
    volume: &Array3<T>,
    affine: &AffineMatrix,
    options: &SaveOptions,
) -> Result<()> {
    let path = path.as_ref();
    let header = header_for_affine(affine, options);

    let xyz = volume
        .view()
        .permuted_axes([2, 1, 0])
        .as_standard_layout()
        .into_owned();

    T::write_nifti(path, &header, &xyz)
        .with_context(|| format!("Failed to save NIfTI file {}", path.display()))?;
    debug!(path = %path.display(), shape = ?volume.dim(), "saved NIfTI volume");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_affine_prefers_sform() {
        let mut header = NiftiHeader::default();
        header.sform_code = 1;
        header.qform_code = 1;
        header.srow_x = [2.0, 0.0, 0.0, -10.0];
        header.srow_y = [0.0, 3.0, 0.0, -20.0];
        header.srow_z = [0.0, 0.0, 4.0, -30.0];

        let aff = header_affine(&header);
        assert_eq!(aff[(0, 0)], 2.0);
        assert_eq!(aff[(1, 1)], 3.0);
        assert_eq!(aff[(2, 3)], -30.0);
        assert!(aff.is_homogeneous(0.0));
    }

    #[test]
    fn test_header_affine_from_identity_qform() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 1;
        header.quatern_b = 0.0;
        header.quatern_c = 0.0;
        header.quatern_d = 0.0;
        header.quatern_x = 5.0;
        header.quatern_y = 6.0;
        header.quatern_z = 7.0;
        header.pixdim = [-1.0, 1.5, 2.0, 2.5, 0.0, 0.0, 0.0, 0.0];

        let aff = header_affine(&header);
        assert_eq!(aff[(0, 0)], 1.5);
        assert_eq!(aff[(1, 1)], 2.0);
        // qfac = -1 flips the third axis
        assert_eq!(aff[(2, 2)], -2.5);
        assert_eq!(aff.translation(), nalgebra::Vector3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_header_affine_pixdim_fallback() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 0;
        header.pixdim = [1.0, 0.5, 0.25, 2.0, 0.0, 0.0, 0.0, 0.0];

        let aff = header_affine(&header);
        assert_eq!(aff[(0, 0)], 0.5);
        assert_eq!(aff[(1, 1)], 0.25);
        assert_eq!(aff[(2, 2)], 2.0);
        assert_eq!(aff.translation(), nalgebra::Vector3::zeros());
    }

    #[test]
    fn test_header_for_affine_sets_sform_and_pixdim() {
        let aff = AffineMatrix::from_rows([
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 3.0, 0.0, -126.0],
            [0.0, 0.0, 4.0, -72.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let header = header_for_affine(&aff, &SaveOptions::new());
        assert_eq!(header.sform_code, XFORM_ALIGNED_ANAT);
        assert_eq!(header.qform_code, XFORM_ALIGNED_ANAT);
        assert_eq!(header.srow_x, [-2.0, 0.0, 0.0, 90.0]);
        assert_eq!(header.srow_z, [0.0, 0.0, 4.0, -72.0]);
        // x flip makes the direction improper, stored as qfac = -1
        assert_eq!(&header.pixdim[..4], &[-1.0, 2.0, 3.0, 4.0]);
        assert_eq!(header_affine(&header), aff);
    }

    #[test]
    fn test_header_affine_from_rotated_qform() {
        // 90 degrees around z: a = d = sqrt(0.5)
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 1;
        header.quatern_b = 0.0;
        header.quatern_c = 0.0;
        header.quatern_d = 0.5f32.sqrt();
        header.quatern_x = 1.0;
        header.quatern_y = 2.0;
        header.quatern_z = 3.0;
        header.pixdim = [1.0, 1.5, 2.0, 2.5, 0.0, 0.0, 0.0, 0.0];

        let aff = header_affine(&header);
        let expected = AffineMatrix::from_rows([
            [0.0, -2.0, 0.0, 1.0],
            [1.5, 0.0, 0.0, 2.0],
            [0.0, 0.0, 2.5, 3.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert!((aff.0 - expected.0).amax() < 1e-6, "got {:?}", aff);
    }

    #[test]
    fn test_qform_written_from_rotated_affine() {
        let aff = AffineMatrix::from_rows([
            [0.0, -2.0, 0.0, 10.0],
            [1.5, 0.0, 0.0, -20.0],
            [0.0, 0.0, -2.5, 30.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let mut header = header_for_affine(&aff, &SaveOptions::new());
        assert_eq!(header.pixdim[0], -1.0);

        // read back through the qform only
        header.sform_code = 0;
        let from_qform = header_affine(&header);
        assert!((from_qform.0 - aff.0).amax() < 1e-5, "got {:?}", from_qform);
    }

    #[test]
    fn test_rotation_to_quaternion_branches() {
        let identity = rotation_to_quaternion(&Matrix3::identity());
        assert_eq!(identity, [1.0, 0.0, 0.0, 0.0]);

        // 180 degrees around y has trace -1
        let half_turn = Matrix3::from_diagonal(&nalgebra::Vector3::new(-1.0, 1.0, -1.0));
        let q = rotation_to_quaternion(&half_turn);
        assert!((q[0]).abs() < 1e-12);
        assert!((q[2].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_qform_disabled() {
        let header = header_for_affine(
            &AffineMatrix::identity(),
            &SaveOptions::new().with_qform_code(0),
        );
        assert_eq!(header.qform_code, 0);
        assert_eq!(header.pixdim[0], 1.0);
    }

    #[test]
    fn test_squeeze_to_3d() {
        let four = ArrayD::<f64>::zeros(vec![2, 3, 4, 1]);
        assert_eq!(squeeze_to_3d(four).unwrap().dim(), (2, 3, 4));

        let two = ArrayD::<f64>::zeros(vec![2, 3]);
        assert!(squeeze_to_3d(two).is_err());

        let series = ArrayD::<f64>::zeros(vec![2, 3, 4, 5]);
        assert!(squeeze_to_3d(series).is_err());
    }
}
