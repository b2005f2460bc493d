use std::path::Path;

use posekit_3d::PointSet;
use posekit_icp::IcpConfig;
use serde::{Deserialize, Serialize};

use crate::{controller::StepSizes, error::AnnotationError};

/// Tunable parameters of an annotation session.
///
/// Every field is optional in the serialized form; missing entries take their
/// default value.
///
/// ```
/// use posekit_annotator::AnnotatorSettings;
///
/// let settings = AnnotatorSettings::from_json_str(r#"{"icp": {"max_iterations": 50}}"#).unwrap();
/// assert_eq!(settings.icp.max_iterations, 50);
/// assert_eq!(settings.steps.translation_fine, 0.01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorSettings {
    /// Step sizes of the keyboard controller.
    pub steps: StepSizes,
    /// Parameters of the ICP refinement.
    pub icp: IcpConfig,
}

impl AnnotatorSettings {
    /// Default settings with the ICP distance threshold scaled to `scene`.
    pub fn for_scene(scene: &PointSet) -> Self {
        Self {
            steps: StepSizes::default(),
            icp: IcpConfig::for_scene(scene),
        }
    }

    /// Set the step sizes.
    pub fn with_steps(mut self, steps: StepSizes) -> Self {
        self.steps = steps;
        self
    }

    /// Set the ICP parameters.
    pub fn with_icp(mut self, icp: IcpConfig) -> Self {
        self.icp = icp;
        self
    }

    /// Parse settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, AnnotationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AnnotationError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&contents)?;
        log::debug!("loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Serialize the settings as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, AnnotationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
