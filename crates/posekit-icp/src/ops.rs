use kiddo::immutable::float::kdtree::ImmutableKdTree;
use posekit_3d::{linalg::transform_points, Point3, PointSet, RigidTransform};

use crate::IcpError;

/// Kd-tree over the scene points; items are indices into the scene point set.
pub(crate) type SceneTree = ImmutableKdTree<f64, u32, 3, 32>;

/// Build the nearest neighbour index for a scene point set.
pub(crate) fn build_kdtree(scene: &PointSet) -> SceneTree {
    ImmutableKdTree::new_from_slice(&scene.to_arrays())
}

/// Inlier pairs between the posed model and the scene.
#[derive(Debug, Default)]
pub(crate) struct Correspondences {
    pub model: Vec<Point3>,
    pub scene: Vec<Point3>,
    pub sq_distances: Vec<f64>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.model.len()
    }

    /// Fitness and RMSE of these pairs relative to `num_model_points`.
    pub fn metrics(&self, num_model_points: usize) -> RegistrationMetrics {
        let inliers = self.len();
        let fitness = if num_model_points == 0 {
            0.0
        } else {
            inliers as f64 / num_model_points as f64
        };
        let rmse = if inliers == 0 {
            0.0
        } else {
            (self.sq_distances.iter().sum::<f64>() / inliers as f64).sqrt()
        };
        RegistrationMetrics {
            fitness,
            rmse,
            inliers,
        }
    }
}

/// Negative and NaN thresholds would silently turn into a positive radius or
/// reject every pair.
pub(crate) fn check_distance_threshold(distance_threshold: f64) -> Result<(), IcpError> {
    if distance_threshold >= 0.0 {
        Ok(())
    } else {
        Err(IcpError::InvalidDistanceThreshold(distance_threshold))
    }
}

/// Match every posed model point to its closest scene point and keep the pairs
/// not farther apart than `max_distance`.
pub(crate) fn find_correspondences(
    posed_model: &[Point3],
    scene: &PointSet,
    kdtree: &SceneTree,
    max_distance: f64,
) -> Correspondences {
    let max_sq_distance = max_distance * max_distance;
    let mut correspondences = Correspondences::default();

    for p in posed_model {
        let nn = kdtree.nearest_one::<kiddo::SquaredEuclidean>(&p.to_array());
        if nn.distance > max_sq_distance {
            continue;
        }
        // the index always comes from the tree built over `scene`
        let Some(q) = scene.get(nn.item as usize) else {
            continue;
        };
        correspondences.model.push(*p);
        correspondences.scene.push(q);
        correspondences.sq_distances.push(nn.distance);
    }

    correspondences
}

/// Quality of a model pose against the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationMetrics {
    /// Fraction of model points with a scene neighbour within the threshold.
    pub fitness: f64,
    /// Root mean square distance over the inlier pairs, 0 without inliers.
    pub rmse: f64,
    /// Number of inlier pairs.
    pub inliers: usize,
}

/// Measure how well `model`, placed at `pose`, fits the `scene`.
///
/// Nothing is iterated: this is the fitness/RMSE an ICP run would report if it
/// stopped at `pose`.
///
/// # Arguments
///
/// * `model` - Model points in the model frame.
/// * `scene` - Scene points.
/// * `pose` - The model pose in the scene frame.
/// * `distance_threshold` - Maximum distance for a pair to count as inlier.
pub fn evaluate_registration(
    model: &PointSet,
    scene: &PointSet,
    pose: &RigidTransform,
    distance_threshold: f64,
) -> Result<RegistrationMetrics, IcpError> {
    if model.is_empty() {
        return Err(IcpError::EmptyPointSet("model"));
    }
    if scene.is_empty() {
        return Err(IcpError::EmptyPointSet("scene"));
    }
    check_distance_threshold(distance_threshold)?;

    let kdtree = build_kdtree(scene);
    let mut posed_model = vec![Point3::ZERO; model.len()];
    transform_points(model.points(), pose, &mut posed_model);

    let correspondences = find_correspondences(&posed_model, scene, &kdtree, distance_threshold);
    Ok(correspondences.metrics(model.len()))
}
