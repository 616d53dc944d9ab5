// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layers: named, ordered containers of storyboard objects.

use osbplay_editor_coordinator::{
    CommandFusionResult, ContributorId, KindRegistry, LayerCommandCoordinator,
};
use osbplay_editor_storyboard::{ObjectId, StoryboardObject};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a layer.
///
/// The unnamed slot is first-class and distinct from the empty-string
/// identifier, in local and shared mode alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerIdentifier {
    /// The single reserved unnamed slot
    Unnamed,
    /// A named layer
    Named(String),
}

impl LayerIdentifier {
    /// Create a named identifier
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Normalize an optional name; `None` addresses the unnamed slot
    pub fn from_option(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::Named(name.to_string()),
            None => Self::Unnamed,
        }
    }

    /// The name, if this is a named identifier
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Unnamed => None,
        }
    }
}

impl fmt::Display for LayerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unnamed => write!(f, "<unnamed>"),
            Self::Named(name) => write!(f, "{name:?}"),
        }
    }
}

/// A named, ordered container of storyboard objects.
///
/// Each layer owns its command coordinator; the object list sits behind its
/// own lock so multiple generator runs can append concurrently. Layers are
/// shared by reference (`Arc<Layer>`).
#[derive(Debug)]
pub struct Layer {
    identifier: LayerIdentifier,
    coordinator: LayerCommandCoordinator,
    objects: RwLock<Vec<StoryboardObject>>,
}

impl Layer {
    /// Create an empty layer
    pub fn new(identifier: LayerIdentifier) -> Self {
        Self {
            identifier,
            coordinator: LayerCommandCoordinator::new(),
            objects: RwLock::new(Vec::new()),
        }
    }

    /// The layer's identifier
    pub fn identifier(&self) -> &LayerIdentifier {
        &self.identifier
    }

    /// The layer's command coordinator
    pub fn coordinator(&self) -> &LayerCommandCoordinator {
        &self.coordinator
    }

    /// Append an object, attributing it to a contributor
    pub fn add_object(&self, object: StoryboardObject, contributor: ContributorId) {
        self.coordinator.track(object.id(), contributor);
        self.objects.write().push(object);
    }

    /// Remove an object, untracking it
    pub fn remove_object(&self, id: ObjectId) -> Option<StoryboardObject> {
        let mut objects = self.objects.write();
        let index = objects.iter().position(|o| o.id() == id)?;
        let object = objects.remove(index);
        self.coordinator.untrack(id);
        Some(object)
    }

    /// Number of objects on the layer
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Read the object list without cloning it
    pub fn with_objects<R>(&self, f: impl FnOnce(&[StoryboardObject]) -> R) -> R {
        f(&self.objects.read())
    }

    /// Reorder the object list into the coordinator's deterministic order.
    ///
    /// Returns whether anything moved.
    pub fn sort_objects(&self) -> bool {
        let mut objects = self.objects.write();
        let Some(order) = self.coordinator.try_build_ordered(&objects) else {
            return false;
        };

        let mut by_id: IndexMap<ObjectId, StoryboardObject> =
            objects.drain(..).map(|o| (o.id(), o)).collect();
        for id in order {
            if let Some(object) = by_id.swap_remove(&id) {
                objects.push(object);
            }
        }
        objects.extend(by_id.into_values());
        true
    }

    /// Fuse every object's commands in place
    pub fn merge_object_commands(&self, registry: &KindRegistry) -> Vec<CommandFusionResult> {
        let mut objects = self.objects.write();
        self.coordinator.merge_commands(&mut objects, registry)
    }

    /// Order-then-fuse pass run once per layer before export
    pub fn post_process(&self, registry: &KindRegistry) -> Vec<CommandFusionResult> {
        let reordered = self.sort_objects();
        let results = self.merge_object_commands(registry);
        tracing::debug!(
            layer = %self.identifier,
            reordered,
            sprites = results.len(),
            "post-processed layer"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osbplay_editor_storyboard::{Command, Easing, Origin, Sprite};

    fn sprite_spanning(start: f64, end: f64) -> StoryboardObject {
        let mut sprite = Sprite::new("sb/dot.png", Origin::Centre, [0.0, 0.0]);
        sprite.add_command(Command::fade(Easing::None, start, end, 0.0, 1.0));
        StoryboardObject::Sprite(sprite)
    }

    #[test]
    fn test_unnamed_is_distinct_from_empty_name() {
        assert_ne!(LayerIdentifier::Unnamed, LayerIdentifier::named(""));
        assert_eq!(LayerIdentifier::from_option(None), LayerIdentifier::Unnamed);
        assert_eq!(
            LayerIdentifier::from_option(Some("bg")),
            LayerIdentifier::named("bg")
        );
    }

    #[test]
    fn test_add_object_tracks_attribution() {
        let layer = Layer::new(LayerIdentifier::named("bg"));
        let contributor = ContributorId::new();
        let object = sprite_spanning(0.0, 100.0);
        let id = object.id();
        layer.add_object(object, contributor);

        assert_eq!(layer.object_count(), 1);
        assert!(layer.coordinator().is_tracked(id));
    }

    #[test]
    fn test_remove_object_untracks() {
        let layer = Layer::new(LayerIdentifier::named("bg"));
        let object = sprite_spanning(0.0, 100.0);
        let id = object.id();
        layer.add_object(object, ContributorId::new());

        assert!(layer.remove_object(id).is_some());
        assert_eq!(layer.object_count(), 0);
        assert!(!layer.coordinator().is_tracked(id));
        assert!(layer.remove_object(id).is_none());
    }

    #[test]
    fn test_sort_objects_applies_coordinator_order() {
        let layer = Layer::new(LayerIdentifier::named("bg"));
        let contributor = ContributorId::new();
        layer.add_object(sprite_spanning(1000.0, 2000.0), contributor);
        layer.add_object(sprite_spanning(0.0, 500.0), contributor);

        assert!(layer.sort_objects());
        let starts =
            layer.with_objects(|objects| objects.iter().map(|o| o.start_time()).collect::<Vec<_>>());
        assert_eq!(starts, vec![0.0, 1000.0]);
        // already ordered now
        assert!(!layer.sort_objects());
    }

    #[test]
    fn test_post_process_fuses_commands() {
        let layer = Layer::new(LayerIdentifier::Unnamed);
        let mut sprite = Sprite::new("sb/dot.png", Origin::Centre, [0.0, 0.0]);
        sprite.add_command(Command::fade(Easing::None, 0.0, 1000.0, 0.0, 1.0));
        sprite.add_command(Command::fade(Easing::None, 900.0, 1500.0, 1.0, 0.0));
        layer.add_object(StoryboardObject::Sprite(sprite), ContributorId::new());

        let results = layer.post_process(&KindRegistry::builtin());
        assert_eq!(results.len(), 1);
        assert!(results[0].has_fusion());
    }
}
