use posekit_icp::IcpError;
use posekit_linalg::RigidError;
use thiserror::Error;

use crate::scene::InstanceId;

/// Error types for the annotation workflow.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Not enough picks on one of the two sides to solve for a pose.
    #[error(
        "at least {required} point pairs are needed, got {model} model and {scene} scene picks"
    )]
    InsufficientCorrespondences {
        /// Number of model picks.
        model: usize,
        /// Number of scene picks.
        scene: usize,
        /// Minimum number of pairs required.
        required: usize,
    },

    /// The model and scene pick lists differ in length.
    #[error("picked {model} model points but {scene} scene points")]
    MismatchedCounts {
        /// Number of model picks.
        model: usize,
        /// Number of scene picks.
        scene: usize,
    },

    /// A model point was picked by an index past the end of the model.
    #[error("model point index {index} is out of range for a model with {len} points")]
    PickOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of points in the model.
        len: usize,
    },

    /// The closed-form solver rejected the correspondences.
    #[error("initial pose estimation failed: {0}")]
    Solver(#[from] RigidError),

    /// The ICP refinement failed.
    #[error("pose refinement failed: {0}")]
    Refinement(#[from] IcpError),

    /// No object with this id is in the scene.
    #[error("no object instance with id {0}")]
    UnknownInstance(InstanceId),

    /// A command was issued while no object is selected.
    #[error("no object is selected")]
    NoActiveObject,

    /// The settings could not be parsed.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// The settings file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
