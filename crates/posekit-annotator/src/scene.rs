use std::{
    collections::BTreeMap,
    fmt,
    sync::{atomic::AtomicBool, Arc},
};

use glam::DVec3;
use posekit_3d::{PointSet, RigidTransform};
use posekit_icp::RefinementResult;

use crate::{
    controller::{Command, Modifiers},
    error::AnnotationError,
    instance::ObjectInstance,
    settings::AnnotatorSettings,
};

/// Offset of a newly added object from the scene: left of its bounding box
/// along X and towards the viewer along Z.
const NEW_OBJECT_OFFSET_X: f64 = -0.15;
const NEW_OBJECT_OFFSET_Z: f64 = -0.2;

/// Stable identifier of an object in an [`AnnotationScene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a command did to the selected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    /// The pose was stepped; holds the new pose.
    Moved(RigidTransform),
    /// The pose was solved from correspondences; holds the new pose.
    Solved(RigidTransform),
    /// The pose was refined.
    Refined(RefinementResult),
}

impl CommandOutcome {
    /// The pose of the object after the command.
    pub fn pose(&self) -> &RigidTransform {
        match self {
            CommandOutcome::Moved(pose) | CommandOutcome::Solved(pose) => pose,
            CommandOutcome::Refined(result) => &result.pose,
        }
    }
}

/// A captured scene with the objects being annotated in it.
#[derive(Debug)]
pub struct AnnotationScene {
    scene: Arc<PointSet>,
    settings: AnnotatorSettings,
    objects: BTreeMap<InstanceId, ObjectInstance>,
    active: Option<InstanceId>,
    next_id: u64,
}

impl AnnotationScene {
    /// Start annotating `scene`.
    pub fn new(scene: impl Into<Arc<PointSet>>, settings: AnnotatorSettings) -> Self {
        Self {
            scene: scene.into(),
            settings,
            objects: BTreeMap::new(),
            active: None,
            next_id: 0,
        }
    }

    /// The scene points.
    pub fn scene(&self) -> &Arc<PointSet> {
        &self.scene
    }

    /// The session settings.
    pub fn settings(&self) -> &AnnotatorSettings {
        &self.settings
    }

    /// Replace the session settings.
    pub fn set_settings(&mut self, settings: AnnotatorSettings) {
        self.settings = settings;
    }

    /// Number of objects in the scene.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene holds no object.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate over the objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = (InstanceId, &ObjectInstance)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }

    /// Get an object.
    pub fn get(&self, id: InstanceId) -> Option<&ObjectInstance> {
        self.objects.get(&id)
    }

    /// Get an object for modification.
    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ObjectInstance> {
        self.objects.get_mut(&id)
    }

    /// Pose given to objects when they are added: beside the scene, facing the
    /// viewer, so that they do not hide the captured surface.
    pub fn initial_pose(&self) -> RigidTransform {
        let min = self.scene.min_bound();
        let center = self.scene.centroid();
        RigidTransform::from_translation(DVec3::new(
            min.x + NEW_OBJECT_OFFSET_X,
            center.y,
            center.z + NEW_OBJECT_OFFSET_Z,
        ))
    }

    /// Add a copy of the model `name` and select it.
    ///
    /// Copies of the same model are numbered from 0; a new copy gets one more
    /// than the highest number in use, so numbers of removed copies are not
    /// reused unless they were the highest.
    pub fn add_object(&mut self, name: &str, model: Arc<PointSet>) -> InstanceId {
        let instance = self
            .objects
            .values()
            .filter(|object| object.name() == name)
            .map(|object| object.instance() + 1)
            .max()
            .unwrap_or(0);

        let id = InstanceId(self.next_id);
        self.next_id += 1;

        let object = ObjectInstance::new(name, instance, model, self.initial_pose());
        log::info!("added {} as {}", object.label(), id);
        self.objects.insert(id, object);
        self.active = Some(id);
        id
    }

    /// Remove an object; it is deselected if it was active.
    pub fn remove_object(&mut self, id: InstanceId) -> Result<ObjectInstance, AnnotationError> {
        let object = self
            .objects
            .remove(&id)
            .ok_or(AnnotationError::UnknownInstance(id))?;
        if self.active == Some(id) {
            self.active = None;
        }
        log::info!("removed {}", object.label());
        Ok(object)
    }

    /// Make `id` the target of subsequent commands.
    pub fn select(&mut self, id: InstanceId) -> Result<(), AnnotationError> {
        if !self.objects.contains_key(&id) {
            return Err(AnnotationError::UnknownInstance(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Clear the selection.
    pub fn deselect(&mut self) {
        self.active = None;
    }

    /// Id of the selected object.
    pub fn active_id(&self) -> Option<InstanceId> {
        self.active
    }

    /// The selected object.
    pub fn active(&self) -> Option<&ObjectInstance> {
        self.active.and_then(|id| self.objects.get(&id))
    }

    /// The selected object, for modification.
    pub fn active_mut(&mut self) -> Option<&mut ObjectInstance> {
        self.active.and_then(|id| self.objects.get_mut(&id))
    }

    /// Label of an object, `"<name>_<instance>"`.
    pub fn instance_label(&self, id: InstanceId) -> Option<String> {
        self.objects.get(&id).map(ObjectInstance::label)
    }

    /// Run `command` on the selected object.
    ///
    /// `modifiers` is the state of the modifier keys when the command was
    /// issued; it only matters for [`Command::Move`].
    pub fn handle_command(
        &mut self,
        command: Command,
        modifiers: Modifiers,
    ) -> Result<CommandOutcome, AnnotationError> {
        let never = AtomicBool::new(false);
        self.handle_command_cancellable(command, modifiers, &never)
    }

    /// Same as [`AnnotationScene::handle_command`], with a cancellation flag
    /// for the refinement.
    pub fn handle_command_cancellable(
        &mut self,
        command: Command,
        modifiers: Modifiers,
        cancel: &AtomicBool,
    ) -> Result<CommandOutcome, AnnotationError> {
        let id = self.active.ok_or(AnnotationError::NoActiveObject)?;
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(AnnotationError::UnknownInstance(id))?;

        match command {
            Command::Move(direction) => {
                let pose = object.apply_delta(
                    direction,
                    modifiers.mode(),
                    modifiers.magnitude(),
                    &self.settings.steps,
                );
                log::debug!("{}: {:?} {:?}", object.label(), modifiers.mode(), direction);
                Ok(CommandOutcome::Moved(pose))
            }
            Command::Solve => Ok(CommandOutcome::Solved(object.solve_initial_pose()?)),
            Command::Refine => Ok(CommandOutcome::Refined(object.refine_pose_cancellable(
                &self.scene,
                &self.settings.icp,
                cancel,
            )?)),
        }
    }
}
