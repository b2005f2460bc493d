#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics.
pub mod camera;

/// Back-projection of depth images into scene point sets.
pub mod depth;

/// Linear algebra utilities.
pub mod linalg;

/// Ordered point sets for models and scenes.
pub mod pointset;

/// Rigid transforms (poses).
pub mod pose;

/// 3D transforms algorithms.
pub mod transforms;

pub use pointset::{Point3, PointSet};
pub use pose::RigidTransform;
