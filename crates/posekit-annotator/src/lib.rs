#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Keyboard controller: discrete translation and rotation steps.
pub mod controller;

/// Model/scene point picking.
pub mod correspondence;

/// Error types for the annotation workflow.
pub mod error;

/// A model placed in the scene with its pose and picks.
pub mod instance;

/// The scene and the objects annotated in it.
pub mod scene;

/// Session settings.
pub mod settings;

pub use controller::{Command, Direction, Modifiers, StepMagnitude, StepSizes, TransformMode};
pub use correspondence::{Correspondence, CorrespondenceManager, CorrespondenceSet, PickSide};
pub use error::AnnotationError;
pub use instance::ObjectInstance;
pub use scene::{AnnotationScene, CommandOutcome, InstanceId};
pub use settings::AnnotatorSettings;
