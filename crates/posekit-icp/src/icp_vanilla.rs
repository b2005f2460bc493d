use std::sync::atomic::{AtomicBool, Ordering};

use posekit_3d::{linalg::transform_points, Point3, PointSet, RigidTransform};
use posekit_linalg::{kabsch, RigidError, MIN_CORRESPONDENCES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ops::{build_kdtree, check_distance_threshold, find_correspondences, RegistrationMetrics};

/// Error types for the ICP refinement.
#[derive(Debug, Error)]
pub enum IcpError {
    /// Too few model points found a scene neighbour within the distance threshold.
    #[error(
        "iteration {iteration} kept {inliers} correspondences within the distance threshold, at least 3 are required"
    )]
    NoInliers {
        /// Iteration at which the correspondences ran out.
        iteration: usize,
        /// Number of pairs that survived the distance threshold.
        inliers: usize,
        /// The last valid pose before the failing iteration.
        last_pose: RigidTransform,
    },

    /// One of the inputs has no points.
    #[error("the {0} point set is empty")]
    EmptyPointSet(&'static str),

    /// The distance threshold is negative or NaN.
    #[error("invalid distance threshold {0}, expected a non-negative value")]
    InvalidDistanceThreshold(f64),

    /// The inlier pairs do not determine a rigid transform.
    #[error(transparent)]
    Solver(#[from] RigidError),
}

/// Parameters of the ICP refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Maximum distance, in scene units, for a nearest neighbour pair to be kept.
    pub distance_threshold: f64,
    /// Convergence tolerance on the change of fitness between two iterations.
    pub fitness_epsilon: f64,
    /// Convergence tolerance on the change of RMSE between two iterations.
    pub rmse_epsilon: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            distance_threshold: 0.01,
            fitness_epsilon: 1e-6,
            rmse_epsilon: 1e-6,
        }
    }
}

impl IcpConfig {
    /// Fraction of the scene bounding-box diagonal used by [`IcpConfig::for_scene`].
    pub const SCENE_DIAGONAL_FRACTION: f64 = 0.02;

    /// Default parameters with the distance threshold scaled to the scene extent.
    ///
    /// Falls back to the default threshold for a scene without extent.
    pub fn for_scene(scene: &PointSet) -> Self {
        let diagonal = scene.bounding_box_diagonal();
        let config = Self::default();
        if diagonal > 0.0 && diagonal.is_finite() {
            config.with_distance_threshold(diagonal * Self::SCENE_DIAGONAL_FRACTION)
        } else {
            config
        }
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the inlier distance threshold.
    pub fn with_distance_threshold(mut self, distance_threshold: f64) -> Self {
        self.distance_threshold = distance_threshold;
        self
    }

    /// Set the fitness convergence tolerance.
    pub fn with_fitness_epsilon(mut self, fitness_epsilon: f64) -> Self {
        self.fitness_epsilon = fitness_epsilon;
        self
    }

    /// Set the RMSE convergence tolerance.
    pub fn with_rmse_epsilon(mut self, rmse_epsilon: f64) -> Self {
        self.rmse_epsilon = rmse_epsilon;
        self
    }
}

/// Result of the ICP refinement.
///
/// The pose maps model points into the scene frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementResult {
    /// The refined pose.
    pub pose: RigidTransform,
    /// Fraction of model points with a scene neighbour within the threshold at `pose`.
    pub fitness: f64,
    /// RMSE of the inlier distances at `pose`.
    pub rmse: f64,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Whether fitness and RMSE settled before the iteration limit.
    pub converged: bool,
    /// Whether the run was stopped through the cancellation flag.
    pub cancelled: bool,
}

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// Each iteration moves the model by the current pose, pairs every model point
/// with its closest scene point, drops pairs farther apart than
/// `config.distance_threshold` and composes the Kabsch alignment of the
/// remaining pairs onto the pose. It stops when neither fitness nor RMSE
/// changed by more than their tolerances, or after `config.max_iterations`.
///
/// # Arguments
///
/// * `model` - Model points in the model frame.
/// * `scene` - Scene points.
/// * `initial_pose` - Seed pose mapping the model into the scene frame.
/// * `config` - ICP parameters.
///
/// # Returns
///
/// The refined pose with its fitness and RMSE, evaluated at that pose.
pub fn icp_point_to_point(
    model: &PointSet,
    scene: &PointSet,
    initial_pose: &RigidTransform,
    config: &IcpConfig,
) -> Result<RefinementResult, IcpError> {
    let never = AtomicBool::new(false);
    icp_point_to_point_cancellable(model, scene, initial_pose, config, &never)
}

/// Same as [`icp_point_to_point`], but stops early once `cancel` is set.
///
/// The flag is checked between iterations. A cancelled run returns the pose of
/// the last completed iteration with `cancelled` set, never a half-updated pose.
pub fn icp_point_to_point_cancellable(
    model: &PointSet,
    scene: &PointSet,
    initial_pose: &RigidTransform,
    config: &IcpConfig,
    cancel: &AtomicBool,
) -> Result<RefinementResult, IcpError> {
    icp_until(model, scene, initial_pose, config, |_| {
        cancel.load(Ordering::Relaxed)
    })
}

// `stop` is asked before each iteration with the number of completed ones
fn icp_until(
    model: &PointSet,
    scene: &PointSet,
    initial_pose: &RigidTransform,
    config: &IcpConfig,
    mut stop: impl FnMut(usize) -> bool,
) -> Result<RefinementResult, IcpError> {
    if model.is_empty() {
        return Err(IcpError::EmptyPointSet("model"));
    }
    if scene.is_empty() {
        return Err(IcpError::EmptyPointSet("scene"));
    }
    check_distance_threshold(config.distance_threshold)?;

    // build kdtree for scene points to speed up the nearest neighbor search
    let kdtree = build_kdtree(scene);

    let mut pose = *initial_pose;
    let mut posed_model = vec![Point3::ZERO; model.len()];
    let mut previous: Option<RegistrationMetrics> = None;
    let mut num_iterations = 0;
    let mut converged = false;
    let mut cancelled = false;

    // main icp loop
    for i in 0..config.max_iterations {
        if stop(num_iterations) {
            log::info!("ICP cancelled after {} iterations", num_iterations);
            cancelled = true;
            break;
        }

        log::debug!("Iteration: {}", i);
        let now = std::time::Instant::now();

        transform_points(model.points(), &pose, &mut posed_model);
        let correspondences =
            find_correspondences(&posed_model, scene, &kdtree, config.distance_threshold);

        log::debug!(
            "Num correspondences: {}/{}",
            correspondences.len(),
            model.len()
        );

        if correspondences.len() < MIN_CORRESPONDENCES {
            return Err(IcpError::NoInliers {
                iteration: i,
                inliers: correspondences.len(),
                last_pose: pose,
            });
        }

        let metrics = correspondences.metrics(model.len());

        // align the posed model onto its matches and accumulate
        // pose_new = correction * pose_old
        let correction = RigidTransform::from(kabsch(
            &correspondences.model,
            &correspondences.scene,
        )?);
        pose = correction.compose(&pose);
        num_iterations += 1;

        log::debug!(
            "fitness: {:.6} rmse: {:.6} elapsed: {:?}",
            metrics.fitness,
            metrics.rmse,
            now.elapsed()
        );

        // check convergence and exit if below tolerance
        if let Some(previous) = previous {
            if (metrics.fitness - previous.fitness).abs() < config.fitness_epsilon
                && (metrics.rmse - previous.rmse).abs() < config.rmse_epsilon
            {
                converged = true;
                break;
            }
        }
        previous = Some(metrics);
    }

    // report the quality of the pose actually returned
    transform_points(model.points(), &pose, &mut posed_model);
    let metrics = find_correspondences(&posed_model, scene, &kdtree, config.distance_threshold)
        .metrics(model.len());

    if !cancelled && metrics.inliers < MIN_CORRESPONDENCES {
        return Err(IcpError::NoInliers {
            iteration: num_iterations,
            inliers: metrics.inliers,
            last_pose: pose,
        });
    }

    log::info!(
        "ICP finished after {} iterations (converged: {}): fitness {:.4}, rmse {:.6}",
        num_iterations,
        converged,
        metrics.fitness,
        metrics.rmse
    );

    Ok(RefinementResult {
        pose,
        fitness: metrics.fitness,
        rmse: metrics.rmse,
        num_iterations,
        converged,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{DMat3, DVec3};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // 5x5x5 grid with 0.25 spacing centred at the origin, each point jittered
    // by at most 0.04 so that neighbours stay at least 0.17 apart
    fn create_jittered_grid(seed: u64) -> PointSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::with_capacity(125);
        for i in 0..5 {
            for j in 0..5 {
                for k in 0..5 {
                    let cell = DVec3::new(i as f64, j as f64, k as f64) * 0.25 - 0.5;
                    let jitter = DVec3::new(
                        rng.random_range(-0.04..0.04),
                        rng.random_range(-0.04..0.04),
                        rng.random_range(-0.04..0.04),
                    );
                    points.push(cell + jitter);
                }
            }
        }
        PointSet::new(points)
    }

    fn small_motion() -> RigidTransform {
        RigidTransform::new(
            DMat3::from_axis_angle(DVec3::new(1.0, 2.0, 3.0).normalize(), 0.03),
            DVec3::new(0.01, -0.02, 0.015),
        )
    }

    #[test]
    fn test_icp_point_to_point() -> Result<(), Box<dyn std::error::Error>> {
        let model = create_jittered_grid(42);
        let scene_from_model = small_motion();
        let scene = model.transformed(&scene_from_model);

        let config = IcpConfig::default().with_distance_threshold(0.1);
        let result = icp_point_to_point(&model, &scene, &RigidTransform::IDENTITY, &config)?;

        assert!(result.converged);
        assert!(!result.cancelled);
        assert!(result.num_iterations <= config.max_iterations);
        assert_relative_eq!(result.fitness, 1.0);
        assert_relative_eq!(result.rmse, 0.0, epsilon = 1e-9);
        assert!(result.pose.abs_diff_eq(&scene_from_model, 1e-9));
        Ok(())
    }

    #[test]
    fn test_icp_partial_overlap() -> Result<(), Box<dyn std::error::Error>> {
        let model = create_jittered_grid(7);
        let scene_from_model = small_motion();

        // the scene only observes the first 60 model points
        let scene = model
            .iter()
            .take(60)
            .map(|&p| scene_from_model.transform_point(p))
            .collect::<PointSet>();

        let config = IcpConfig::default().with_distance_threshold(0.1);
        let result = icp_point_to_point(&model, &scene, &RigidTransform::IDENTITY, &config)?;

        assert_relative_eq!(result.fitness, 60.0 / 125.0);
        assert_relative_eq!(result.rmse, 0.0, epsilon = 1e-9);
        assert!(result.pose.abs_diff_eq(&scene_from_model, 1e-9));
        Ok(())
    }

    #[test]
    fn test_icp_seeded_out_of_reach() {
        let model = create_jittered_grid(3);
        let scene = model.clone();
        let seed = RigidTransform::from_translation(DVec3::new(10.0, 0.0, 0.0));

        let config = IcpConfig::default().with_distance_threshold(0.1);
        match icp_point_to_point(&model, &scene, &seed, &config) {
            Err(IcpError::NoInliers {
                iteration,
                inliers,
                last_pose,
            }) => {
                assert_eq!(iteration, 0);
                assert_eq!(inliers, 0);
                assert_eq!(last_pose, seed);
            }
            other => panic!("expected NoInliers, got {other:?}"),
        }
    }

    #[test]
    fn test_icp_cancelled() -> Result<(), Box<dyn std::error::Error>> {
        let model = create_jittered_grid(11);
        let scene = model.transformed(&small_motion());

        let cancel = AtomicBool::new(true);
        let config = IcpConfig::default().with_distance_threshold(0.1);
        let result = icp_point_to_point_cancellable(
            &model,
            &scene,
            &RigidTransform::IDENTITY,
            &config,
            &cancel,
        )?;

        assert!(result.cancelled);
        assert!(!result.converged);
        assert_eq!(result.num_iterations, 0);
        assert_eq!(result.pose, RigidTransform::IDENTITY);
        // the initial pose is close enough for every point to be an inlier
        assert_relative_eq!(result.fitness, 1.0);
        assert!(result.rmse > 0.0);
        Ok(())
    }

    #[test]
    fn test_icp_cancelled_between_iterations() -> Result<(), Box<dyn std::error::Error>> {
        let model = create_jittered_grid(12);
        let scene = model.transformed(&small_motion());

        // zero tolerances never converge, every run goes to its stopping point
        let config = IcpConfig::default()
            .with_distance_threshold(0.1)
            .with_fitness_epsilon(0.0)
            .with_rmse_epsilon(0.0);

        let cancel = AtomicBool::new(false);
        let result = icp_until(&model, &scene, &RigidTransform::IDENTITY, &config, |done| {
            if done == 3 {
                cancel.store(true, Ordering::Relaxed);
            }
            cancel.load(Ordering::Relaxed)
        })?;
        assert!(result.cancelled);
        assert!(!result.converged);
        assert_eq!(result.num_iterations, 3);

        // same pose as a run that was only allowed three iterations
        let three = icp_point_to_point(
            &model,
            &scene,
            &RigidTransform::IDENTITY,
            &config.with_max_iterations(3),
        )?;
        assert!(!three.cancelled);
        assert_eq!(three.num_iterations, 3);
        assert_eq!(result.pose, three.pose);
        assert_eq!(result.fitness, three.fitness);
        assert_eq!(result.rmse, three.rmse);
        Ok(())
    }

    #[test]
    fn test_icp_invalid_distance_threshold() {
        let model = create_jittered_grid(13);
        let scene = model.transformed(&small_motion());
        for threshold in [-0.05, f64::NAN] {
            let config = IcpConfig::default().with_distance_threshold(threshold);
            assert!(matches!(
                icp_point_to_point(&model, &scene, &RigidTransform::IDENTITY, &config),
                Err(IcpError::InvalidDistanceThreshold(_))
            ));
        }
    }

    #[test]
    fn test_icp_iteration_limit() -> Result<(), Box<dyn std::error::Error>> {
        let model = create_jittered_grid(5);
        let scene = model.transformed(&small_motion());

        let config = IcpConfig::default()
            .with_distance_threshold(0.1)
            .with_max_iterations(1);
        let result = icp_point_to_point(&model, &scene, &RigidTransform::IDENTITY, &config)?;

        assert_eq!(result.num_iterations, 1);
        assert!(!result.converged);
        Ok(())
    }

    #[test]
    fn test_icp_empty_inputs() {
        let points = create_jittered_grid(1);
        let config = IcpConfig::default();
        assert!(matches!(
            icp_point_to_point(
                &PointSet::default(),
                &points,
                &RigidTransform::IDENTITY,
                &config
            ),
            Err(IcpError::EmptyPointSet("model"))
        ));
        assert!(matches!(
            icp_point_to_point(
                &points,
                &PointSet::default(),
                &RigidTransform::IDENTITY,
                &config
            ),
            Err(IcpError::EmptyPointSet("scene"))
        ));
    }

    #[test]
    fn test_icp_degenerate_inliers() {
        // collinear model and scene: inliers exist but fix no rotation
        let model = PointSet::from_arrays(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
        ]);
        let scene = model.clone();
        let config = IcpConfig::default().with_distance_threshold(0.5);
        assert!(matches!(
            icp_point_to_point(&model, &scene, &RigidTransform::IDENTITY, &config),
            Err(IcpError::Solver(RigidError::DegenerateConfiguration { .. }))
        ));
    }

    #[test]
    fn test_icp_config_for_scene() -> Result<(), Box<dyn std::error::Error>> {
        let scene = PointSet::from_arrays(&[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]);
        let config = IcpConfig::for_scene(&scene);
        assert_relative_eq!(config.distance_threshold, 0.1);
        assert_eq!(config.max_iterations, 30);

        let flat = IcpConfig::for_scene(&PointSet::default());
        assert_eq!(flat, IcpConfig::default());

        // missing fields fall back to the defaults
        let parsed: IcpConfig = serde_json::from_str(r#"{"max_iterations": 5}"#)?;
        assert_eq!(parsed, IcpConfig::default().with_max_iterations(5));
        Ok(())
    }
}
