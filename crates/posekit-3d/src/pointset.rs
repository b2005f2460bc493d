use glam::DVec3;

use crate::{linalg::transform_points, pose::RigidTransform};

/// A 3D coordinate in double precision.
pub type Point3 = DVec3;

/// An ordered set of 3D points.
///
/// Holds either the sampled surface of a model (in the model frame) or the
/// observed surface of a scene, e.g. back-projected from a depth map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    // The points, in insertion order.
    points: Vec<Point3>,
}

impl PointSet {
    /// Create a new point set.
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Create a point set from plain arrays.
    pub fn from_arrays(points: &[[f64; 3]]) -> Self {
        points.iter().map(|p| DVec3::from_array(*p)).collect()
    }

    /// Get the number of points in the point set.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point set.
    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Get the point at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Point3> {
        self.points.get(index).copied()
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    /// Copy the points out as plain arrays, e.g. to build a spatial index.
    pub fn to_arrays(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| p.to_array()).collect()
    }

    /// Get the centroid of the point set, the origin if empty.
    pub fn centroid(&self) -> Point3 {
        if self.points.is_empty() {
            return DVec3::ZERO;
        }
        self.points.iter().fold(DVec3::ZERO, |acc, &p| acc + p) / self.points.len() as f64
    }

    /// Get the minimum bound of the point set.
    pub fn min_bound(&self) -> Point3 {
        match self.points.first() {
            Some(&first) => self.points.iter().fold(first, |a, &b| a.min(b)),
            None => DVec3::ZERO,
        }
    }

    /// Get the maximum bound of the point set.
    pub fn max_bound(&self) -> Point3 {
        match self.points.first() {
            Some(&first) => self.points.iter().fold(first, |a, &b| a.max(b)),
            None => DVec3::ZERO,
        }
    }

    /// Length of the diagonal of the axis-aligned bounding box.
    pub fn bounding_box_diagonal(&self) -> f64 {
        (self.max_bound() - self.min_bound()).length()
    }

    /// Return a copy of the point set with `transform` applied to every point.
    pub fn transformed(&self, transform: &RigidTransform) -> PointSet {
        let mut points = vec![DVec3::ZERO; self.points.len()];
        transform_points(&self.points, transform, &mut points);
        Self { points }
    }

    /// Return a copy with every coordinate multiplied by `factor`, e.g. `1e-3` for mm to m.
    pub fn scaled(&self, factor: f64) -> PointSet {
        self.points.iter().map(|&p| p * factor).collect()
    }
}

impl From<Vec<Point3>> for PointSet {
    fn from(points: Vec<Point3>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point3> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point3;
    type IntoIter = std::slice::Iter<'a, Point3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pointset() {
        let pointset = PointSet::from_arrays(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);

        assert_eq!(pointset.len(), 2);
        assert!(!pointset.is_empty());
        assert_eq!(pointset.get(1), Some(DVec3::new(1.0, 0.0, 0.0)));
        assert_eq!(pointset.get(2), None);
        assert_eq!(pointset.to_arrays(), vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_bounds_and_centroid() {
        let pointset = PointSet::from_arrays(&[
            [0.0, -1.0, 2.0],
            [2.0, 1.0, 0.0],
            [1.0, 3.0, 1.0],
        ]);

        assert_eq!(pointset.min_bound(), DVec3::new(0.0, -1.0, 0.0));
        assert_eq!(pointset.max_bound(), DVec3::new(2.0, 3.0, 2.0));
        assert_relative_eq!(pointset.bounding_box_diagonal(), 24.0_f64.sqrt());
        assert!(pointset.centroid().abs_diff_eq(DVec3::new(1.0, 1.0, 1.0), 1e-12));
    }

    #[test]
    fn test_empty_pointset() {
        let pointset = PointSet::default();
        assert!(pointset.is_empty());
        assert_eq!(pointset.centroid(), DVec3::ZERO);
        assert_eq!(pointset.min_bound(), DVec3::ZERO);
        assert_eq!(pointset.bounding_box_diagonal(), 0.0);
    }

    #[test]
    fn test_transformed_and_scaled() {
        let pointset = PointSet::from_arrays(&[[1000.0, 0.0, 0.0], [0.0, 2000.0, 0.0]]);
        let meters = pointset.scaled(1e-3);
        assert!(meters.points()[1].abs_diff_eq(DVec3::new(0.0, 2.0, 0.0), 1e-12));

        let shift = RigidTransform::from_translation(DVec3::new(0.0, 0.0, 1.0));
        let moved = meters.transformed(&shift);
        assert!(moved.points()[0].abs_diff_eq(DVec3::new(1.0, 0.0, 1.0), 1e-12));
        // the source is left untouched
        assert!(meters.points()[0].abs_diff_eq(DVec3::new(1.0, 0.0, 0.0), 1e-12));
    }
}
