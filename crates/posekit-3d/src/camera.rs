use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::pointset::Point3;

/// A struct representing the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeCameraIntrinsic {
    /// The focal length in pixels (fx, fy)
    pub focal_length: (f64, f64),
    /// The principal point in pixels (cx, cy)
    pub principal_point: (f64, f64),
    /// The image dimensions (width, height)
    pub image_size: (usize, usize),
}

impl PinholeCameraIntrinsic {
    /// Creates a new PinholeCameraIntrinsic with the given parameters.
    pub fn new(
        focal_length: (f64, f64),
        principal_point: (f64, f64),
        image_size: (usize, usize),
    ) -> Self {
        Self {
            focal_length,
            principal_point,
            image_size,
        }
    }

    /// Back-project pixel `(u, v)` at metric depth `z` into the camera frame.
    ///
    /// x points right, y points down and z points into the scene.
    #[inline]
    pub fn backproject(&self, u: f64, v: f64, z: f64) -> Point3 {
        let (fx, fy) = self.focal_length;
        let (cx, cy) = self.principal_point;
        DVec3::new((u - cx) * z / fx, (v - cy) * z / fy, z)
    }
}
