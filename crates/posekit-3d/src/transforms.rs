use glam::{DMat3, DVec3};
use thiserror::Error;

/// Error type for axis-angle conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AxisAngleError {
    /// The rotation axis has (close to) zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation, normalized internally.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use glam::DVec3;
/// use posekit_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(DVec3::X, std::f64::consts::PI / 2.0).unwrap();
/// assert!((rotation * DVec3::Y).abs_diff_eq(DVec3::Z, 1e-12));
/// ```
pub fn axis_angle_to_rotation_matrix(axis: DVec3, angle: f64) -> Result<DMat3, AxisAngleError> {
    // normalize the vector
    let magnitude = axis.length();
    if magnitude < 1e-10 {
        return Err(AxisAngleError::ZeroAxis);
    }
    let DVec3 { x, y, z } = axis / magnitude;

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    let m00 = c + x * x * t;
    let m11 = c + y * y * t;
    let m22 = c + z * z * t;

    let tmp1 = x * y * t;
    let tmp2 = z * s;

    let m10 = tmp1 + tmp2;
    let m01 = tmp1 - tmp2;

    let tmp3 = x * z * t;
    let tmp4 = y * s;

    let m20 = tmp3 - tmp4;
    let m02 = tmp3 + tmp4;

    let tmp5 = y * z * t;
    let tmp6 = x * s;

    let m12 = tmp5 - tmp6;
    let m21 = tmp5 + tmp6;

    // glam matrices are column major
    Ok(DMat3::from_cols(
        DVec3::new(m00, m10, m20),
        DVec3::new(m01, m11, m21),
        DVec3::new(m02, m12, m22),
    ))
}

/// Convert degrees to radians.
#[inline]
pub fn deg2rad(degrees: f64) -> f64 {
    degrees.to_radians()
}
