use posekit_3d::{Point3, PointSet};
use posekit_linalg::MIN_CORRESPONDENCES;

use crate::error::AnnotationError;

/// A model point paired with the scene point it should land on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Position of the pair in pick order, starting at 0.
    pub order: usize,
    /// The point in the model frame.
    pub model: Point3,
    /// The point in the scene frame.
    pub scene: Point3,
}

/// Correspondences in pick order.
pub type CorrespondenceSet = Vec<Correspondence>;

/// Which point set a pick was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickSide {
    /// A point on the model, in the model frame.
    Model,
    /// A point on the scene.
    Scene,
}

/// Accumulates the points picked on the model and on the scene.
///
/// The two sides are picked independently; the i-th model pick pairs with the
/// i-th scene pick. Nothing is validated geometrically here, collinear or
/// repeated picks are caught by the solver.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceManager {
    model_picks: Vec<Point3>,
    scene_picks: Vec<Point3>,
    // side of every pick, across both lists, oldest first
    history: Vec<PickSide>,
}

impl CorrespondenceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point given in the model frame.
    pub fn add_model_pick(&mut self, point: Point3) {
        self.model_picks.push(point);
        self.history.push(PickSide::Model);
    }

    /// Append the model point at `index`.
    pub fn add_model_pick_index(
        &mut self,
        model: &PointSet,
        index: usize,
    ) -> Result<Point3, AnnotationError> {
        let point = model.get(index).ok_or(AnnotationError::PickOutOfRange {
            index,
            len: model.len(),
        })?;
        self.add_model_pick(point);
        Ok(point)
    }

    /// Append a point given in the scene frame.
    pub fn add_scene_pick(&mut self, point: Point3) {
        self.scene_picks.push(point);
        self.history.push(PickSide::Scene);
    }

    /// Remove the most recent pick, whichever side it was made on.
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo_last_pick(&mut self) -> Option<(PickSide, Point3)> {
        let side = self.history.pop()?;
        let point = match side {
            PickSide::Model => self.model_picks.pop(),
            PickSide::Scene => self.scene_picks.pop(),
        }?;
        Some((side, point))
    }

    /// Drop all picks on both sides.
    pub fn reset(&mut self) {
        self.model_picks.clear();
        self.scene_picks.clear();
        self.history.clear();
    }

    /// The model picks, in pick order.
    pub fn model_picks(&self) -> &[Point3] {
        &self.model_picks
    }

    /// The scene picks, in pick order.
    pub fn scene_picks(&self) -> &[Point3] {
        &self.scene_picks
    }

    /// Whether neither side holds a pick.
    pub fn is_empty(&self) -> bool {
        self.model_picks.is_empty() && self.scene_picks.is_empty()
    }

    /// Both pick lists, after checking they form a solvable set of pairs.
    ///
    /// The count check comes first: with fewer than 3 picks on either side the
    /// error is `InsufficientCorrespondences` even if the lengths also differ.
    /// Lists of different lengths are never truncated.
    pub fn pairs(&self) -> Result<(&[Point3], &[Point3]), AnnotationError> {
        let (model, scene) = (self.model_picks.len(), self.scene_picks.len());
        if model < MIN_CORRESPONDENCES || scene < MIN_CORRESPONDENCES {
            return Err(AnnotationError::InsufficientCorrespondences {
                model,
                scene,
                required: MIN_CORRESPONDENCES,
            });
        }
        if model != scene {
            return Err(AnnotationError::MismatchedCounts { model, scene });
        }
        Ok((&self.model_picks, &self.scene_picks))
    }

    /// Zip both lists into correspondences, see [`CorrespondenceManager::pairs`].
    pub fn to_correspondences(&self) -> Result<CorrespondenceSet, AnnotationError> {
        let (model, scene) = self.pairs()?;
        Ok(model
            .iter()
            .zip(scene)
            .enumerate()
            .map(|(order, (&model, &scene))| Correspondence {
                order,
                model,
                scene,
            })
            .collect())
    }
}
