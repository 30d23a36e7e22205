//! Spatial types: affine matrices, direction cosines and volume shapes.
//!
//! All types are based on nalgebra, in double precision.

pub mod affine;
pub mod direction;
pub mod shape;

pub use affine::AffineMatrix;
pub use direction::Direction;
pub use shape::VolumeShape;

pub type Point3 = nalgebra::Point3<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
