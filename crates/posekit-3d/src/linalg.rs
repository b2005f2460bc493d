use crate::{pointset::Point3, pose::RigidTransform};

/// Transform a set of points using a rigid transform.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_from_src` - The transform mapping the source frame into the destination frame.
/// * `dst_points` - A pre-allocated slice to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated slice of the same size as source.
///
/// Example:
///
/// ```
/// use glam::DVec3;
/// use posekit_3d::{linalg::transform_points, RigidTransform};
///
/// let src_points = vec![DVec3::new(2.0, 2.0, 2.0), DVec3::new(3.0, 4.0, 5.0)];
/// let shift = RigidTransform::from_translation(DVec3::new(1.0, 0.0, 0.0));
/// let mut dst_points = vec![DVec3::ZERO; src_points.len()];
/// transform_points(&src_points, &shift, &mut dst_points);
/// assert_eq!(dst_points[0], DVec3::new(3.0, 2.0, 2.0));
/// ```
pub fn transform_points(
    src_points: &[Point3],
    dst_from_src: &RigidTransform,
    dst_points: &mut [Point3],
) {
    assert_eq!(src_points.len(), dst_points.len());

    let rotation = *dst_from_src.rotation();
    let translation = *dst_from_src.translation();

    for (dst, src) in dst_points.iter_mut().zip(src_points.iter()) {
        *dst = rotation * *src + translation;
    }
}
