//! Rigid alignment utilities (Kabsch / Procrustes)

use glam::{DMat3, DVec3};
use thiserror::Error;

use crate::svd::svd3;

/// Minimum number of point pairs needed to fix a rigid transformation.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Ratio `σ₂ / σ₁` below which the cross-covariance is considered rank deficient.
const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Error type for rigid alignment operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigidError {
    /// Fewer point pairs than needed to fix a rotation.
    #[error("rigid alignment requires at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of correspondences required.
        required: usize,
        /// Actual number of correspondences provided.
        actual: usize,
    },

    /// Source and destination arrays must have the same length.
    #[error("mismatched point counts: model ({model}) != scene ({scene})")]
    MismatchedCounts {
        /// Number of model-side points.
        model: usize,
        /// Number of scene-side points.
        scene: usize,
    },

    /// The points are collinear or coincident, the rotation is not unique.
    #[error("degenerate point configuration (collinear or coincident points), singular values {singular_values:?}")]
    DegenerateConfiguration {
        /// Singular values of the cross-covariance matrix, descending.
        singular_values: [f64; 3],
    },
}

/// Output of [`kabsch`].
///
/// The transformation maps source points onto destination points:
/// `dst ≈ rotation * src + translation`.
#[derive(Debug, Clone, Copy)]
pub struct RigidAlignment {
    /// Estimated rotation matrix.
    pub rotation: DMat3,
    /// Estimated translation vector.
    pub translation: DVec3,
    /// Singular values of the cross-covariance matrix, descending.
    pub singular_values: DVec3,
    /// Whether the reflection case was hit and corrected.
    pub reflection_corrected: bool,
}

/// Compute centroids of two point sets
///
/// # Arguments
///
/// * `points_src` - A set of points.
/// * `points_dst` - Another set of points.
///
/// # Returns
///
/// The centroids of the two sets of points. Empty inputs yield the origin.
pub fn compute_centroids(points_src: &[DVec3], points_dst: &[DVec3]) -> (DVec3, DVec3) {
    let centroid = |points: &[DVec3]| {
        if points.is_empty() {
            return DVec3::ZERO;
        }
        points.iter().fold(DVec3::ZERO, |acc, &p| acc + p) / points.len() as f64
    };
    (centroid(points_src), centroid(points_dst))
}

/// Compute the optimal rigid transformation between two corresponding point sets.
///
/// Implements the closed-form least squares solution of Arun, Huang and
/// Blostein, "Least-squares fitting of two 3-D point sets", IEEE PAMI 1987:
///
/// 1. Compute centroids of both point sets
/// 2. Center both point sets by subtracting their respective centroids
/// 3. Compute the cross-covariance matrix H = Σ[(p_src - p_src_mean) * (p_dst - p_dst_mean)^T]
/// 4. Compute the SVD of H = U * S * V^T
/// 5. Calculate rotation matrix R = V * U^T
/// 6. If det(R) < 0, negate the last column of V and recompute R
/// 7. Calculate translation vector t = p_dst_mean - R * p_src_mean
///
/// # Arguments
///
/// * `points_src` - Source points, e.g. picked on the model.
/// * `points_dst` - Destination points, e.g. picked in the scene. Must have the same length.
///
/// # Errors
///
/// * [`RigidError::MismatchedCounts`] if the slices differ in length.
/// * [`RigidError::InsufficientCorrespondences`] if fewer than three pairs are given.
/// * [`RigidError::DegenerateConfiguration`] if the points are collinear or coincident.
pub fn kabsch(points_src: &[DVec3], points_dst: &[DVec3]) -> Result<RigidAlignment, RigidError> {
    if points_src.len() != points_dst.len() {
        return Err(RigidError::MismatchedCounts {
            model: points_src.len(),
            scene: points_dst.len(),
        });
    }
    if points_src.len() < MIN_CORRESPONDENCES {
        return Err(RigidError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: points_src.len(),
        });
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_src, points_dst);

    // cross-covariance matrix H = Σ[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = DMat3::ZERO;
    for (&src_pt, &dst_pt) in points_src.iter().zip(points_dst.iter()) {
        let src_centered = src_pt - src_centroid;
        let dst_centered = dst_pt - dst_centroid;
        h += DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        );
    }

    let svd_result = svd3(&h);
    let s = *svd_result.s();

    // a unique rotation needs at least two independent directions
    if s.x <= f64::MIN_POSITIVE || s.y <= DEGENERACY_TOLERANCE * s.x {
        return Err(RigidError::DegenerateConfiguration {
            singular_values: s.to_array(),
        });
    }

    let u = *svd_result.u();
    let v = *svd_result.v();

    let mut r = v * u.transpose();

    // handle reflection case to ensure proper rotation matrix
    let reflection_corrected = r.determinant() < 0.0;
    if reflection_corrected {
        log::warn!("det(R) < 0, reflection detected, correcting for it");
        let v_corrected = DMat3::from_cols(v.x_axis, v.y_axis, -v.z_axis);
        r = v_corrected * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    Ok(RigidAlignment {
        rotation: r,
        translation: t,
        singular_values: s,
        reflection_corrected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn assert_mat3_eq(a: &DMat3, b: &DMat3, epsilon: f64) {
        for (ca, cb) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_relative_eq!(ca, cb, epsilon = epsilon);
        }
    }

    fn unit_points() -> Vec<DVec3> {
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn test_compute_centroids() {
        let points1 = vec![DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0)];
        let points2 = vec![DVec3::new(7.0, 8.0, 9.0), DVec3::new(10.0, 11.0, 12.0)];
        let (centroid1, centroid2) = compute_centroids(&points1, &points2);
        assert_relative_eq!(centroid1.x, 2.5);
        assert_relative_eq!(centroid1.y, 3.5);
        assert_relative_eq!(centroid1.z, 4.5);
        assert_relative_eq!(centroid2.x, 8.5);
        assert_relative_eq!(centroid2.y, 9.5);
        assert_relative_eq!(centroid2.z, 10.5);
    }

    #[test]
    fn test_identity_transformation() -> Result<(), RigidError> {
        let points_src = unit_points();
        let alignment = kabsch(&points_src, &points_src)?;
        assert_mat3_eq(&alignment.rotation, &DMat3::IDENTITY, 1e-12);
        assert!(alignment.translation.abs_diff_eq(DVec3::ZERO, 1e-12));
        Ok(())
    }

    #[test]
    fn test_pure_rotation() -> Result<(), RigidError> {
        let points_src = unit_points();

        // rotate 90° around X axis: y -> z, z -> -y
        let points_dst = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(0.0, -1.0, 0.0),
        ];

        let alignment = kabsch(&points_src, &points_dst)?;
        let expected_r = DMat3::from_rotation_x(std::f64::consts::FRAC_PI_2);
        assert_mat3_eq(&alignment.rotation, &expected_r, 1e-12);
        assert!(alignment.translation.abs_diff_eq(DVec3::ZERO, 1e-12));
        Ok(())
    }

    #[test]
    fn test_three_points_rotation_and_translation() -> Result<(), RigidError> {
        let points_src = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        // rotated 90° about Z, then shifted by (2, 0, 0)
        let points_dst = vec![
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(2.0, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
        ];

        let alignment = kabsch(&points_src, &points_dst)?;
        let expected_r = DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        assert_mat3_eq(&alignment.rotation, &expected_r, 1e-12);
        assert_relative_eq!(alignment.translation.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(alignment.translation.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(alignment.translation.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(alignment.rotation.determinant(), 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_random_transform_with_noise() -> Result<(), RigidError> {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = 1e-6;

        for _ in 0..10 {
            let points_src = (0..30)
                .map(|_| DVec3::new(rng.random(), rng.random(), rng.random()))
                .collect::<Vec<_>>();

            let axis = DVec3::new(rng.random(), rng.random(), rng.random()).normalize();
            let expected_r = DMat3::from_axis_angle(axis, rng.random::<f64>() * 3.0);
            let expected_t = DVec3::new(rng.random(), rng.random(), rng.random());

            let points_dst = points_src
                .iter()
                .map(|&p| {
                    let jitter = DVec3::new(
                        rng.random_range(-noise..noise),
                        rng.random_range(-noise..noise),
                        rng.random_range(-noise..noise),
                    );
                    expected_r * p + expected_t + jitter
                })
                .collect::<Vec<_>>();

            let alignment = kabsch(&points_src, &points_dst)?;
            assert_mat3_eq(&alignment.rotation, &expected_r, 1e-4);
            assert!(alignment.translation.abs_diff_eq(expected_t, 1e-4));
        }
        Ok(())
    }

    #[test]
    fn test_reflection_is_corrected() -> Result<(), RigidError> {
        // destination is the mirror image of the source through the XY plane
        let points_src = vec![
            DVec3::new(1.0, 0.0, 0.5),
            DVec3::new(0.0, 1.0, -0.5),
            DVec3::new(-1.0, 0.0, 0.25),
            DVec3::new(0.0, -1.0, 1.0),
        ];
        let points_dst = points_src
            .iter()
            .map(|p| DVec3::new(p.x, p.y, -p.z))
            .collect::<Vec<_>>();

        let alignment = kabsch(&points_src, &points_dst)?;
        assert!(alignment.reflection_corrected);
        assert_relative_eq!(alignment.rotation.determinant(), 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let points_src = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(2.0, 2.0, 2.0),
        ];
        let points_dst = vec![
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(2.0, 0.5, 0.0),
            DVec3::new(0.0, 3.0, 1.0),
        ];
        let result = kabsch(&points_src, &points_dst);
        assert!(matches!(
            result,
            Err(RigidError::DegenerateConfiguration { .. })
        ));
    }

    #[test]
    fn test_coincident_points_are_degenerate() {
        let points = vec![DVec3::ONE; 4];
        let result = kabsch(&points, &points);
        assert!(matches!(
            result,
            Err(RigidError::DegenerateConfiguration { .. })
        ));
    }

    #[test]
    fn test_input_validation() {
        let three = unit_points()[..3].to_vec();
        let two = unit_points()[..2].to_vec();

        assert_eq!(
            kabsch(&three, &two).err(),
            Some(RigidError::MismatchedCounts { model: 3, scene: 2 })
        );
        assert_eq!(
            kabsch(&two, &two).err(),
            Some(RigidError::InsufficientCorrespondences {
                required: 3,
                actual: 2
            })
        );
    }
}
