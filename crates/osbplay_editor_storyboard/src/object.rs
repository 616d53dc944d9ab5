// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storyboard object model.
//!
//! Objects are tracked by value in layer object lists and addressed through
//! their [`ObjectId`]; segments own their children directly, so no parent
//! back-pointers exist anywhere in the model.

use crate::command::{sanitize_time, Command};
use crate::display::{self, DisplayState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a storyboard object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Create a new random object ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sprite anchor origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Origin {
    TopLeft,
    TopCentre,
    TopRight,
    CentreLeft,
    #[default]
    Centre,
    CentreRight,
    BottomLeft,
    BottomCentre,
    BottomRight,
}

/// Animation frame loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoopType {
    /// Frames cycle for the object's lifetime
    #[default]
    LoopForever,
    /// Frames play once, then hold the last frame
    LoopOnce,
}

/// A textured sprite with an ordered command list and derived display state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    /// Unique object ID
    pub id: ObjectId,
    /// Texture path relative to the mapset
    pub texture_path: String,
    /// Anchor origin
    pub origin: Origin,
    /// Position before any command applies
    pub initial_position: [f64; 2],
    commands: Vec<Command>,
    display: DisplayState,
}

impl Sprite {
    /// Create a new sprite
    pub fn new(texture_path: impl Into<String>, origin: Origin, initial_position: [f64; 2]) -> Self {
        Self {
            id: ObjectId::new(),
            texture_path: texture_path.into(),
            origin,
            initial_position,
            commands: Vec::new(),
            display: DisplayState::default(),
        }
    }

    /// Append a command and refresh the derived state
    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
        display::rebuild(&mut self.display, &self.commands);
    }

    /// The command list, in storage order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Replace the command list and rebuild every derived display timeline,
    /// the trigger flag and the cached command-span cumulants.
    pub fn rebuild_display_state(&mut self, commands: Vec<Command>) {
        self.commands = commands;
        display::rebuild(&mut self.display, &self.commands);
    }

    /// Derived display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Whether any trigger group is present
    pub fn has_trigger(&self) -> bool {
        self.display.has_trigger
    }

    /// Earliest command start
    pub fn start_time(&self) -> f64 {
        self.display.commands_start_time
    }

    /// Latest command end
    pub fn end_time(&self) -> f64 {
        self.display.commands_end_time
    }
}

/// A sprite cycling through numbered texture frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    /// The underlying sprite, including its command list
    pub sprite: Sprite,
    /// Number of frames
    pub frame_count: u32,
    /// Delay between frames in milliseconds
    pub frame_delay: f64,
    /// Frame loop behavior
    pub loop_type: LoopType,
}

impl Animation {
    /// Create a new animation
    pub fn new(
        texture_path: impl Into<String>,
        origin: Origin,
        initial_position: [f64; 2],
        frame_count: u32,
        frame_delay: f64,
        loop_type: LoopType,
    ) -> Self {
        Self {
            sprite: Sprite::new(texture_path, origin, initial_position),
            frame_count,
            frame_delay,
            loop_type,
        }
    }
}

/// A one-shot audio sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique object ID
    pub id: ObjectId,
    /// Audio path relative to the mapset
    pub audio_path: String,
    /// Playback time in milliseconds
    pub time: f64,
    /// Volume in `0.0..=100.0`
    pub volume: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(audio_path: impl Into<String>, time: f64, volume: f64) -> Self {
        Self {
            id: ObjectId::new(),
            audio_path: audio_path.into(),
            time,
            volume,
        }
    }
}

/// A storyboard object owning an ordered list of children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique object ID
    pub id: ObjectId,
    children: Vec<StoryboardObject>,
}

impl Segment {
    /// Create a new empty segment
    pub fn new() -> Self {
        Self {
            id: ObjectId::new(),
            children: Vec::new(),
        }
    }

    /// Add a child object
    pub fn add(&mut self, child: StoryboardObject) {
        self.children.push(child);
    }

    /// Child objects, in storage order
    pub fn children(&self) -> &[StoryboardObject] {
        &self.children
    }

    /// Mutable child objects
    pub fn children_mut(&mut self) -> &mut [StoryboardObject] {
        &mut self.children
    }

    /// Earliest start over the recursive closure; `0.0` when empty
    pub fn start_time(&self) -> f64 {
        let min = self
            .children
            .iter()
            .map(StoryboardObject::start_time)
            .fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            min
        } else {
            0.0
        }
    }

    /// Latest end over the recursive closure; `0.0` when empty
    pub fn end_time(&self) -> f64 {
        let max = self
            .children
            .iter()
            .map(StoryboardObject::end_time)
            .fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() {
            max
        } else {
            0.0
        }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

/// Any object a contributor can place on a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoryboardObject {
    /// Textured sprite
    Sprite(Sprite),
    /// Frame animation
    Animation(Animation),
    /// Audio sample
    Sample(Sample),
    /// Nested object list
    Segment(Segment),
}

impl StoryboardObject {
    /// Unique object ID
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Sprite(s) => s.id,
            Self::Animation(a) => a.sprite.id,
            Self::Sample(s) => s.id,
            Self::Segment(s) => s.id,
        }
    }

    /// Sanitized start time; segments take the min over their closure
    pub fn start_time(&self) -> f64 {
        let raw = match self {
            Self::Sprite(s) => s.start_time(),
            Self::Animation(a) => a.sprite.start_time(),
            Self::Sample(s) => s.time,
            Self::Segment(s) => s.start_time(),
        };
        sanitize_time(raw)
    }

    /// Sanitized end time; segments take the max over their closure
    pub fn end_time(&self) -> f64 {
        let raw = match self {
            Self::Sprite(s) => s.end_time(),
            Self::Animation(a) => a.sprite.end_time(),
            Self::Sample(s) => s.time,
            Self::Segment(s) => s.end_time(),
        };
        sanitize_time(raw)
    }

    /// Sprite-like capability: sprites and animations
    pub fn as_sprite(&self) -> Option<&Sprite> {
        match self {
            Self::Sprite(s) => Some(s),
            Self::Animation(a) => Some(&a.sprite),
            _ => None,
        }
    }

    /// Mutable sprite-like capability
    pub fn as_sprite_mut(&mut self) -> Option<&mut Sprite> {
        match self {
            Self::Sprite(s) => Some(s),
            Self::Animation(a) => Some(&mut a.sprite),
            _ => None,
        }
    }

    /// Segment capability
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Self::Segment(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable segment capability
    pub fn as_segment_mut(&mut self) -> Option<&mut Segment> {
        match self {
            Self::Segment(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;

    fn sprite_spanning(start: f64, end: f64) -> Sprite {
        let mut sprite = Sprite::new("sb/dot.png", Origin::Centre, [320.0, 240.0]);
        sprite.add_command(Command::fade(Easing::None, start, end, 0.0, 1.0));
        sprite
    }

    #[test]
    fn test_sprite_times_follow_commands() {
        let sprite = sprite_spanning(250.0, 4000.0);
        assert_eq!(sprite.start_time(), 250.0);
        assert_eq!(sprite.end_time(), 4000.0);
    }

    #[test]
    fn test_segment_bounds_are_recursive() {
        let mut inner = Segment::new();
        inner.add(StoryboardObject::Sprite(sprite_spanning(500.0, 900.0)));

        let mut outer = Segment::new();
        outer.add(StoryboardObject::Sprite(sprite_spanning(100.0, 300.0)));
        outer.add(StoryboardObject::Segment(inner));

        let object = StoryboardObject::Segment(outer);
        assert_eq!(object.start_time(), 100.0);
        assert_eq!(object.end_time(), 900.0);
    }

    #[test]
    fn test_empty_segment_bounds_are_zero() {
        let object = StoryboardObject::Segment(Segment::new());
        assert_eq!(object.start_time(), 0.0);
        assert_eq!(object.end_time(), 0.0);
    }

    #[test]
    fn test_sample_is_point_like() {
        let object = StoryboardObject::Sample(Sample::new("sb/clap.wav", 1234.0, 80.0));
        assert_eq!(object.start_time(), 1234.0);
        assert_eq!(object.end_time(), 1234.0);
    }

    #[test]
    fn test_animation_exposes_sprite_capability() {
        let mut object = StoryboardObject::Animation(Animation::new(
            "sb/flash.png",
            Origin::Centre,
            [0.0, 0.0],
            10,
            40.0,
            LoopType::LoopOnce,
        ));
        assert!(object.as_sprite().is_some());
        object
            .as_sprite_mut()
            .unwrap()
            .add_command(Command::fade(Easing::None, 0.0, 100.0, 1.0, 0.0));
        assert_eq!(object.end_time(), 100.0);
    }

    #[test]
    fn test_non_finite_object_times_sanitize() {
        let mut sprite = Sprite::new("sb/dot.png", Origin::Centre, [0.0, 0.0]);
        sprite.add_command(Command::fade(Easing::None, f64::NAN, f64::INFINITY, 0.0, 1.0));
        let object = StoryboardObject::Sprite(sprite);
        assert_eq!(object.start_time(), 0.0);
        assert_eq!(object.end_time(), 0.0);
    }
}
