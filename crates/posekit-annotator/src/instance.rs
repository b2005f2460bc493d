use std::sync::{atomic::AtomicBool, Arc};

use posekit_3d::{Point3, PointSet, RigidTransform};
use posekit_icp::{icp_point_to_point_cancellable, IcpConfig, RefinementResult};

use crate::{
    controller::{apply_delta, Direction, StepMagnitude, StepSizes, TransformMode},
    correspondence::{CorrespondenceManager, PickSide},
    error::AnnotationError,
};

/// One placed copy of a model in the scene.
///
/// Owns the current pose (model frame to scene frame) and the picks made for
/// it. The model points are shared between all copies of the same model.
/// Every operation that fails leaves the pose as it was.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    name: String,
    instance: u32,
    model: Arc<PointSet>,
    // rotation pivot of the keyboard controller, in the model frame
    pivot: Point3,
    pose: RigidTransform,
    correspondences: CorrespondenceManager,
}

impl ObjectInstance {
    /// Place `model` at `pose`.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the model, shared by its copies.
    /// * `instance` - Number telling copies of the same model apart.
    /// * `model` - Model points in the model frame.
    /// * `pose` - Initial pose in the scene frame.
    pub fn new(
        name: impl Into<String>,
        instance: u32,
        model: Arc<PointSet>,
        pose: RigidTransform,
    ) -> Self {
        let pivot = model.centroid();
        Self {
            name: name.into(),
            instance,
            model,
            pivot,
            pose,
            correspondences: CorrespondenceManager::new(),
        }
    }

    /// Name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance number among copies of the same model.
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Display label, `"<name>_<instance>"`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.name, self.instance)
    }

    /// The model points, in the model frame.
    pub fn model(&self) -> &Arc<PointSet> {
        &self.model
    }

    /// The current pose.
    pub fn pose(&self) -> &RigidTransform {
        &self.pose
    }

    /// Overwrite the pose, e.g. with one restored by the caller.
    pub fn set_pose(&mut self, pose: RigidTransform) {
        self.pose = pose;
    }

    /// The picks made so far.
    pub fn correspondences(&self) -> &CorrespondenceManager {
        &self.correspondences
    }

    /// Add a model pick given in the model frame.
    pub fn add_model_pick(&mut self, point: Point3) {
        self.correspondences.add_model_pick(point);
    }

    /// Add the model point at `index` as a model pick.
    pub fn add_model_pick_index(&mut self, index: usize) -> Result<Point3, AnnotationError> {
        self.correspondences.add_model_pick_index(&self.model, index)
    }

    /// Add a model pick made on the displayed (posed) model.
    ///
    /// The point is brought back to the model frame through the inverse pose,
    /// which is what gets stored and returned.
    pub fn add_model_pick_in_scene(&mut self, scene_point: Point3) -> Point3 {
        let point = self.pose.inverse().transform_point(scene_point);
        self.correspondences.add_model_pick(point);
        point
    }

    /// Add a scene pick.
    pub fn add_scene_pick(&mut self, point: Point3) {
        self.correspondences.add_scene_pick(point);
    }

    /// Undo the most recent pick on either side.
    pub fn undo_last_pick(&mut self) -> Option<(PickSide, Point3)> {
        let undone = self.correspondences.undo_last_pick();
        match undone {
            Some((side, point)) => log::debug!("{}: undid {side:?} pick {point}", self.label()),
            None => log::debug!("{}: no pick to undo", self.label()),
        }
        undone
    }

    /// Drop all picks.
    pub fn reset_correspondences(&mut self) {
        self.correspondences.reset();
    }

    /// Estimate the pose from the picked point pairs.
    ///
    /// The result replaces the current pose, whatever it was. On success the
    /// picks are consumed so that the next solve starts from fresh pairs.
    pub fn solve_initial_pose(&mut self) -> Result<RigidTransform, AnnotationError> {
        let (model, scene) = self.correspondences.pairs()?;
        let pose = RigidTransform::from_correspondences(model, scene)?;

        log::info!(
            "{}: solved pose from {} correspondences",
            self.label(),
            model.len()
        );

        self.pose = pose;
        self.correspondences.reset();
        Ok(pose)
    }

    /// Refine the current pose against the scene points with ICP.
    pub fn refine_pose(
        &mut self,
        scene: &PointSet,
        config: &IcpConfig,
    ) -> Result<RefinementResult, AnnotationError> {
        let never = AtomicBool::new(false);
        self.refine_pose_cancellable(scene, config, &never)
    }

    /// Same as [`ObjectInstance::refine_pose`], stopping early once `cancel` is set.
    ///
    /// A cancelled refinement still moves the object to the pose of its last
    /// completed iteration.
    pub fn refine_pose_cancellable(
        &mut self,
        scene: &PointSet,
        config: &IcpConfig,
        cancel: &AtomicBool,
    ) -> Result<RefinementResult, AnnotationError> {
        let result =
            icp_point_to_point_cancellable(&self.model, scene, &self.pose, config, cancel)?;

        log::info!(
            "{}: refined pose, fitness {:.4} rmse {:.6}",
            self.label(),
            result.fitness,
            result.rmse
        );

        self.pose = result.pose;
        Ok(result)
    }

    /// Step the pose by one controller increment in the object's local frame.
    ///
    /// Rotations turn about the centroid of the model.
    pub fn apply_delta(
        &mut self,
        direction: Direction,
        mode: TransformMode,
        magnitude: StepMagnitude,
        steps: &StepSizes,
    ) -> RigidTransform {
        self.pose = apply_delta(&self.pose, direction, mode, magnitude, steps, self.pivot);
        self.pose
    }
}
