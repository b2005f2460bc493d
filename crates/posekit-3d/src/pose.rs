use std::ops::Mul;

use glam::{DMat3, DMat4, DVec3, DVec4};
use posekit_linalg::{kabsch, RigidAlignment, RigidError};
use serde::{Deserialize, Serialize};

use crate::{
    pointset::Point3,
    transforms::{axis_angle_to_rotation_matrix, AxisAngleError},
};

/// Deviation of `RᵀR` from identity above which the rotation is re-orthogonalized.
pub const ORTHONORMAL_DRIFT_TOLERANCE: f64 = 1e-9;

/// A rigid transformation: a proper rotation followed by a translation.
///
/// Used as the pose of a model in scene coordinates, i.e. it maps points from
/// the model frame to the scene frame: `p_scene = R * p_model + t`.
///
/// Composition follows matrix multiplication: `a * b` applies `b` first.
///
/// Deserialized transforms go through [`RigidTransform::new`], so their
/// rotation is repaired like any other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRigidTransform")]
pub struct RigidTransform {
    rotation: DMat3,
    translation: DVec3,
}

// same fields as `RigidTransform`, before the rotation is repaired
#[derive(Deserialize)]
struct RawRigidTransform {
    rotation: DMat3,
    translation: DVec3,
}

impl From<RawRigidTransform> for RigidTransform {
    fn from(raw: RawRigidTransform) -> Self {
        Self::new(raw.rotation, raw.translation)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from a rotation matrix and a translation vector.
    ///
    /// The rotation is re-orthogonalized if it drifted from orthonormal or
    /// if it is a reflection (negative determinant).
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
        .with_repaired_rotation()
    }

    /// A pure translation.
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation,
        }
    }

    /// A rotation of `angle` radians about `axis`, followed by `translation`.
    ///
    /// The axis does not need to be normalized but must not be zero.
    pub fn from_axis_angle(
        axis: DVec3,
        angle: f64,
        translation: DVec3,
    ) -> Result<Self, AxisAngleError> {
        Ok(Self::new(
            axis_angle_to_rotation_matrix(axis, angle)?,
            translation,
        ))
    }

    /// The rotation `rotation` applied about `pivot` instead of the origin, so
    /// that the pivot stays in place.
    pub fn from_rotation_about(rotation: DMat3, pivot: DVec3) -> Self {
        Self::new(rotation, pivot - rotation * pivot)
    }

    /// Estimate the transform mapping `model` points onto `scene` points.
    ///
    /// See [`posekit_linalg::kabsch`] for the algorithm and error conditions.
    pub fn from_correspondences(model: &[Point3], scene: &[Point3]) -> Result<Self, RigidError> {
        Ok(kabsch(model, scene)?.into())
    }

    /// Get the rotation matrix.
    #[inline]
    pub fn rotation(&self) -> &DMat3 {
        &self.rotation
    }

    /// Get the translation vector.
    #[inline]
    pub fn translation(&self) -> &DVec3 {
        &self.translation
    }

    /// The inverse transform, mapping scene points back to the model frame.
    pub fn inverse(&self) -> Self {
        let rotation_inv = self.rotation.transpose();
        Self {
            rotation: rotation_inv,
            translation: -(rotation_inv * self.translation),
        }
    }

    /// Compose two transforms, `self * other`; `other` is applied first.
    pub fn compose(&self, other: &RigidTransform) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
        .with_repaired_rotation()
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.rotation * point + self.translation
    }

    /// The 4x4 homogeneous matrix of the transform.
    pub fn to_homogeneous(&self) -> DMat4 {
        DMat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            DVec4::new(
                self.translation.x,
                self.translation.y,
                self.translation.z,
                1.0,
            ),
        )
    }

    /// Build a transform from a 4x4 homogeneous matrix, ignoring the last row.
    pub fn from_homogeneous(matrix: &DMat4) -> Self {
        Self::new(
            DMat3::from_cols(
                matrix.x_axis.truncate(),
                matrix.y_axis.truncate(),
                matrix.z_axis.truncate(),
            ),
            matrix.w_axis.truncate(),
        )
    }

    /// Largest absolute entry of `RᵀR - I`.
    pub fn orthonormal_drift(&self) -> f64 {
        let gram = self.rotation.transpose() * self.rotation - DMat3::IDENTITY;
        gram.to_cols_array()
            .iter()
            .fold(0.0_f64, |acc, x| acc.max(x.abs()))
    }

    /// Return a copy whose rotation is exactly orthonormal with determinant +1.
    ///
    /// Gram-Schmidt on the first two columns; the third is their cross product.
    pub fn orthonormalized(&self) -> Self {
        let x = self.rotation.x_axis.normalize();
        let y = (self.rotation.y_axis - x * x.dot(self.rotation.y_axis)).normalize();
        let z = x.cross(y);
        Self {
            rotation: DMat3::from_cols(x, y, z),
            translation: self.translation,
        }
    }

    fn with_repaired_rotation(self) -> Self {
        let drift = self.orthonormal_drift();
        if drift > ORTHONORMAL_DRIFT_TOLERANCE {
            log::warn!("rotation drifted from orthonormal by {drift:e}, re-orthogonalizing");
            return self.orthonormalized();
        }
        // an orthonormal reflection has no drift
        if self.rotation.determinant() < 0.0 {
            log::warn!("rotation is a reflection, flipping its third axis");
            return self.orthonormalized();
        }
        self
    }

    /// Rotation angle in radians, in `[0, π]`.
    pub fn rotation_angle(&self) -> f64 {
        let cos_angle = ((self.rotation.x_axis.x + self.rotation.y_axis.y + self.rotation.z_axis.z
            - 1.0)
            / 2.0)
            .clamp(-1.0, 1.0);
        cos_angle.acos()
    }

    /// Rotation angle (radians) and translation distance separating two transforms.
    pub fn distance_to(&self, other: &RigidTransform) -> (f64, f64) {
        let delta = self.inverse().compose(other);
        (
            delta.rotation_angle(),
            (self.translation - other.translation).length(),
        )
    }

    /// Whether all rotation and translation entries are within `max_abs_diff`.
    pub fn abs_diff_eq(&self, other: &RigidTransform, max_abs_diff: f64) -> bool {
        self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.translation.abs_diff_eq(other.translation, max_abs_diff)
    }
}

impl From<RigidAlignment> for RigidTransform {
    fn from(alignment: RigidAlignment) -> Self {
        Self::new(alignment.rotation, alignment.translation)
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> Self::Output {
        self.compose(&rhs)
    }
}

impl Mul<Point3> for RigidTransform {
    type Output = Point3;

    fn mul(self, rhs: Point3) -> Self::Output {
        self.transform_point(rhs)
    }
}
