use glam::{DMat3, DVec3};
use posekit_3d::{transforms::deg2rad, Point3, RigidTransform};
use serde::{Deserialize, Serialize};

/// One of the six signed axis directions a step can go along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +X
    PosX,
    /// -X
    NegX,
    /// +Y
    PosY,
    /// -Y
    NegY,
    /// +Z
    PosZ,
    /// -Z
    NegZ,
}

impl Direction {
    /// All six directions.
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    /// The signed unit vector of the direction.
    pub fn unit_vector(self) -> DVec3 {
        match self {
            Direction::PosX => DVec3::X,
            Direction::NegX => DVec3::NEG_X,
            Direction::PosY => DVec3::Y,
            Direction::NegY => DVec3::NEG_Y,
            Direction::PosZ => DVec3::Z,
            Direction::NegZ => DVec3::NEG_Z,
        }
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::PosX => Direction::NegX,
            Direction::NegX => Direction::PosX,
            Direction::PosY => Direction::NegY,
            Direction::NegY => Direction::PosY,
            Direction::PosZ => Direction::NegZ,
            Direction::NegZ => Direction::PosZ,
        }
    }
}

/// Whether a step moves or turns the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformMode {
    /// Move along the direction.
    Translation,
    /// Turn about the direction, right-handed.
    Rotation,
}

/// Size class of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepMagnitude {
    /// Small step for final adjustments.
    Fine,
    /// Large step for rough placement.
    Coarse,
}

/// Modifier keys held when a command is issued.
///
/// The mode is read from this snapshot for every command instead of being kept
/// as a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Rotation instead of translation (shift in the desktop tool).
    pub rotate: bool,
    /// Coarse instead of fine steps (control in the desktop tool).
    pub coarse: bool,
}

impl Modifiers {
    /// No modifier held: fine translation.
    pub const NONE: Self = Self {
        rotate: false,
        coarse: false,
    };

    /// The transform mode selected by this snapshot.
    pub fn mode(&self) -> TransformMode {
        if self.rotate {
            TransformMode::Rotation
        } else {
            TransformMode::Translation
        }
    }

    /// The step magnitude selected by this snapshot.
    pub fn magnitude(&self) -> StepMagnitude {
        if self.coarse {
            StepMagnitude::Coarse
        } else {
            StepMagnitude::Fine
        }
    }
}

/// Step sizes of the interactive controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSizes {
    /// Fine translation step, in scene units.
    pub translation_fine: f64,
    /// Coarse translation step, in scene units.
    pub translation_coarse: f64,
    /// Fine rotation step, in degrees.
    pub rotation_fine_deg: f64,
    /// Coarse rotation step, in degrees.
    pub rotation_coarse_deg: f64,
}

impl Default for StepSizes {
    fn default() -> Self {
        Self {
            translation_fine: 0.01,
            translation_coarse: 0.05,
            rotation_fine_deg: 2.0,
            rotation_coarse_deg: 90.0,
        }
    }
}

impl StepSizes {
    /// Set the fine and coarse translation steps.
    pub fn with_translation(mut self, fine: f64, coarse: f64) -> Self {
        self.translation_fine = fine;
        self.translation_coarse = coarse;
        self
    }

    /// Set the fine and coarse rotation steps, in degrees.
    pub fn with_rotation_deg(mut self, fine: f64, coarse: f64) -> Self {
        self.rotation_fine_deg = fine;
        self.rotation_coarse_deg = coarse;
        self
    }

    /// Length of a translation step.
    pub fn translation_step(&self, magnitude: StepMagnitude) -> f64 {
        match magnitude {
            StepMagnitude::Fine => self.translation_fine,
            StepMagnitude::Coarse => self.translation_coarse,
        }
    }

    /// Angle of a rotation step, in radians.
    pub fn rotation_step(&self, magnitude: StepMagnitude) -> f64 {
        match magnitude {
            StepMagnitude::Fine => deg2rad(self.rotation_fine_deg),
            StepMagnitude::Coarse => deg2rad(self.rotation_coarse_deg),
        }
    }
}

/// The incremental transform of a single step.
///
/// Rotations turn about the line through `pivot` along the direction, so the
/// pivot itself stays in place. The delta is expressed in the object frame.
pub fn delta(
    direction: Direction,
    mode: TransformMode,
    magnitude: StepMagnitude,
    steps: &StepSizes,
    pivot: Point3,
) -> RigidTransform {
    match mode {
        TransformMode::Translation => RigidTransform::from_translation(
            direction.unit_vector() * steps.translation_step(magnitude),
        ),
        TransformMode::Rotation => RigidTransform::from_rotation_about(
            DMat3::from_axis_angle(direction.unit_vector(), steps.rotation_step(magnitude)),
            pivot,
        ),
    }
}

/// Apply one step to `pose` in the object's local frame: `pose * delta`.
pub fn apply_delta(
    pose: &RigidTransform,
    direction: Direction,
    mode: TransformMode,
    magnitude: StepMagnitude,
    steps: &StepSizes,
    pivot: Point3,
) -> RigidTransform {
    pose.compose(&delta(direction, mode, magnitude, steps, pivot))
}

/// A user command directed at the selected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Step the pose along or about a direction.
    Move(Direction),
    /// Solve the pose from the picked correspondences.
    Solve,
    /// Refine the pose with ICP.
    Refine,
}

impl Command {
    /// Map a key press to a command, the desktop tool's layout.
    ///
    /// Translation: `L`/`J` ±X, `K`/`I` ±Y, `U`/`M` ±Z.
    /// Rotation: `U`/`I` ±X, `J`/`K` ±Y, `M`/`,` ±Z.
    /// `F` solves and `R` refines regardless of the modifiers.
    /// Letters are case insensitive; unmapped keys yield `None`.
    pub fn from_key(key: char, modifiers: Modifiers) -> Option<Command> {
        let key = key.to_ascii_lowercase();
        match key {
            'f' => return Some(Command::Solve),
            'r' => return Some(Command::Refine),
            _ => {}
        }

        let direction = match modifiers.mode() {
            TransformMode::Translation => match key {
                'l' => Direction::PosX,
                'j' => Direction::NegX,
                'k' => Direction::PosY,
                'i' => Direction::NegY,
                'u' => Direction::PosZ,
                'm' => Direction::NegZ,
                _ => return None,
            },
            TransformMode::Rotation => match key {
                'u' => Direction::PosX,
                'i' => Direction::NegX,
                'j' => Direction::PosY,
                'k' => Direction::NegY,
                'm' => Direction::PosZ,
                ',' => Direction::NegZ,
                _ => return None,
            },
        };
        Some(Command::Move(direction))
    }
}
