use thiserror::Error;

use crate::{camera::PinholeCameraIntrinsic, pointset::PointSet};

/// Error types for depth image handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DepthError {
    /// The depth buffer length does not match `width * height`.
    #[error("depth buffer has {actual} values, expected {expected} ({width}x{height})")]
    InvalidBufferLength {
        /// Image width in pixels.
        width: usize,
        /// Image height in pixels.
        height: usize,
        /// Expected number of depth values.
        expected: usize,
        /// Actual number of depth values.
        actual: usize,
    },

    /// The camera intrinsics were calibrated for a different image size.
    #[error("depth image is {depth:?} but the intrinsics expect {intrinsic:?}")]
    SizeMismatch {
        /// Depth image (width, height).
        depth: (usize, usize),
        /// Intrinsics image (width, height).
        intrinsic: (usize, usize),
    },

    /// Focal lengths must be strictly positive.
    #[error("invalid focal length {0:?}")]
    InvalidFocalLength((f64, f64)),
}

/// A single channel depth image stored in row-major order.
#[derive(Debug, Clone)]
pub struct DepthImage {
    width: usize,
    height: usize,
    depth: Vec<f64>,
}

impl DepthImage {
    /// Creates a new depth image from raw values in sensor units.
    pub fn new(depth: Vec<f64>, width: usize, height: usize) -> Result<Self, DepthError> {
        let invalid_length = |expected| DepthError::InvalidBufferLength {
            width,
            height,
            expected,
            actual: depth.len(),
        };
        // no buffer can hold more than usize::MAX values
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| invalid_length(usize::MAX))?;
        if depth.len() != expected {
            return Err(invalid_length(expected));
        }
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    /// Returns the dimensions of the image (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get the depth value at a specific pixel.
    #[inline]
    pub fn get_depth(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depth.get(y * self.width + x).copied()
    }
}

/// Back-project a depth image into a scene point set in the camera frame.
///
/// Given a raw depth value `d` at pixel `(u, v)`, the metric depth is
/// `z = d * depth_scale` and the point is `((u - cx) z / fx, (v - cy) z / fy, z)`.
/// Pixels with a non-finite or non-positive depth carry no measurement and are
/// skipped.
///
/// # Arguments
///
/// * `depth` - The depth image.
/// * `intrinsic` - The pinhole intrinsics of the depth camera.
/// * `depth_scale` - Factor converting raw depth values to scene units.
pub fn depth_to_point_set(
    depth: &DepthImage,
    intrinsic: &PinholeCameraIntrinsic,
    depth_scale: f64,
) -> Result<PointSet, DepthError> {
    if depth.dimensions() != intrinsic.image_size {
        return Err(DepthError::SizeMismatch {
            depth: depth.dimensions(),
            intrinsic: intrinsic.image_size,
        });
    }
    let (fx, fy) = intrinsic.focal_length;
    if fx <= 0.0 || fy <= 0.0 {
        return Err(DepthError::InvalidFocalLength(intrinsic.focal_length));
    }

    let points = depth
        .depth
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| {
            let z = d * depth_scale;
            if !z.is_finite() || z <= 0.0 {
                return None;
            }
            let u = (i % depth.width) as f64;
            let v = (i / depth.width) as f64;
            Some(intrinsic.backproject(u, v, z))
        })
        .collect::<PointSet>();

    log::debug!(
        "back-projected {} of {} depth pixels",
        points.len(),
        depth.depth.len()
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_depth_image_buffer_length() {
        let result = DepthImage::new(vec![0.0; 5], 2, 3);
        assert!(matches!(
            result,
            Err(DepthError::InvalidBufferLength {
                expected: 6,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_depth_image_dimensions_overflow() {
        let result = DepthImage::new(vec![0.0; 4], usize::MAX, 2);
        assert!(matches!(
            result,
            Err(DepthError::InvalidBufferLength {
                expected: usize::MAX,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_get_depth() -> Result<(), DepthError> {
        let image = DepthImage::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2)?;
        assert_eq!(image.get_depth(2, 1), Some(6.0));
        assert_eq!(image.get_depth(3, 0), None);
        Ok(())
    }

    #[test]
    fn test_depth_to_point_set() -> Result<(), DepthError> {
        // 2x2 depth in millimeters, one missing measurement
        let image = DepthImage::new(vec![1000.0, 0.0, 2000.0, 1000.0], 2, 2)?;
        let intrinsic = PinholeCameraIntrinsic::new((1.0, 1.0), (0.0, 0.0), (2, 2));

        let points = depth_to_point_set(&image, &intrinsic, 1e-3)?;
        assert_eq!(points.len(), 3);
        assert!(points.points()[0].abs_diff_eq(DVec3::new(0.0, 0.0, 1.0), 1e-12));
        assert!(points.points()[1].abs_diff_eq(DVec3::new(0.0, 2.0, 2.0), 1e-12));
        assert!(points.points()[2].abs_diff_eq(DVec3::new(1.0, 1.0, 1.0), 1e-12));
        Ok(())
    }

    #[test]
    fn test_depth_to_point_set_size_mismatch() -> Result<(), DepthError> {
        let image = DepthImage::new(vec![1.0; 4], 2, 2)?;
        let intrinsic = PinholeCameraIntrinsic::new((1.0, 1.0), (0.0, 0.0), (4, 4));
        assert!(matches!(
            depth_to_point_set(&image, &intrinsic, 1.0),
            Err(DepthError::SizeMismatch { .. })
        ));
        Ok(())
    }
}
