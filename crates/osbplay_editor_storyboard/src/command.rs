// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storyboard command model.
//!
//! Commands are value records: a kind tag, an easing tag, a start/end time
//! and a start/end value typed to the kind. Loop and trigger groups carry an
//! ordered inner command list and are opaque to fusion.

use crate::easing::Easing;
use serde::{Deserialize, Serialize};

/// Clamp a non-finite time to zero.
///
/// NaN and infinite times occasionally reach the coordinator from script
/// arithmetic; ordering and merge decisions treat them as `0.0`.
pub fn sanitize_time(time: f64) -> f64 {
    if time.is_finite() {
        time
    } else {
        0.0
    }
}

/// Kind tag for storyboard commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// 2D position
    Move,
    /// Horizontal position only
    MoveX,
    /// Vertical position only
    MoveY,
    /// Uniform scale
    Scale,
    /// Per-axis scale
    ScaleVec,
    /// Rotation in radians
    Rotate,
    /// Opacity
    Fade,
    /// Sprite tint
    Color,
    /// Render parameter toggle (flip / additive)
    Parameter,
    /// Loop group
    Loop,
    /// Trigger group
    Trigger,
}

impl CommandKind {
    /// Stable key used for deterministic cross-kind ordering
    pub fn type_key(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::MoveX => "move-x",
            Self::MoveY => "move-y",
            Self::Scale => "scale",
            Self::ScaleVec => "scale-vec",
            Self::Rotate => "rotate",
            Self::Fade => "fade",
            Self::Color => "color",
            Self::Parameter => "parameter",
            Self::Loop => "loop",
            Self::Trigger => "trigger",
        }
    }

    /// Whether this kind is a command group rather than a value command
    pub fn is_group(self) -> bool {
        matches!(self, Self::Loop | Self::Trigger)
    }
}

/// Payload of a parameter command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Mirror horizontally
    FlipH,
    /// Mirror vertically
    FlipV,
    /// Additive blending
    Additive,
}

/// Value carried by a command endpoint, typed to the kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandValue {
    /// 2D vector (position, per-axis scale)
    Vec2([f64; 2]),
    /// Scalar (fade, rotation, uniform scale, single axis)
    Float(f64),
    /// RGB color, each channel in `0.0..=1.0`
    Color([f64; 3]),
    /// Parameter toggle
    Parameter(ParameterKind),
}

impl CommandValue {
    /// Get as 2D vector if possible
    pub fn as_vec2(&self) -> Option<[f64; 2]> {
        match self {
            Self::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as scalar if possible
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<[f64; 3]> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as parameter payload if possible
    pub fn as_parameter(&self) -> Option<ParameterKind> {
        match self {
            Self::Parameter(v) => Some(*v),
            _ => None,
        }
    }
}

/// A plain value command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicCommand {
    /// Kind tag
    pub kind: CommandKind,
    /// Easing across the duration
    pub easing: Easing,
    /// Start time in milliseconds
    pub start_time: f64,
    /// End time in milliseconds
    pub end_time: f64,
    /// Value at the start time
    pub start_value: CommandValue,
    /// Value at the end time
    pub end_value: CommandValue,
}

impl BasicCommand {
    /// Create a new value command
    pub fn new(
        kind: CommandKind,
        easing: Easing,
        start_time: f64,
        end_time: f64,
        start_value: CommandValue,
        end_value: CommandValue,
    ) -> Self {
        Self {
            kind,
            easing,
            start_time,
            end_time,
            start_value,
            end_value,
        }
    }
}

/// A loop group: the inner commands play `loop_count` times from `start_time`.
///
/// Inner command times are relative to the loop start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCommand {
    /// Absolute start time of the first iteration
    pub start_time: f64,
    /// Number of iterations, at least 1
    pub loop_count: u32,
    /// Inner commands, times relative to the loop start
    pub commands: Vec<Command>,
}

impl LoopCommand {
    /// Create a new loop group
    pub fn new(start_time: f64, loop_count: u32) -> Self {
        Self {
            start_time,
            loop_count: loop_count.max(1),
            commands: Vec::new(),
        }
    }

    /// Add an inner command
    pub fn add(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Duration of a single iteration: the largest inner end time
    pub fn iteration_duration(&self) -> f64 {
        self.commands
            .iter()
            .map(|c| sanitize_time(c.end_time()))
            .fold(0.0, f64::max)
    }

    /// Absolute end time over all iterations
    pub fn end_time(&self) -> f64 {
        self.start_time + self.iteration_duration() * f64::from(self.loop_count)
    }
}

/// A trigger group: the inner commands play when the trigger condition fires
/// inside the `start_time..end_time` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCommand {
    /// Trigger condition name, e.g. `"HitSoundClap"`
    pub trigger_name: String,
    /// Window start
    pub start_time: f64,
    /// Window end
    pub end_time: f64,
    /// Trigger group number
    pub group_number: i32,
    /// Inner commands, times relative to the trigger fire time
    pub commands: Vec<Command>,
}

impl TriggerCommand {
    /// Create a new trigger group
    pub fn new(
        trigger_name: impl Into<String>,
        start_time: f64,
        end_time: f64,
        group_number: i32,
    ) -> Self {
        Self {
            trigger_name: trigger_name.into(),
            start_time,
            end_time,
            group_number,
            commands: Vec::new(),
        }
    }

    /// Add an inner command
    pub fn add(&mut self, command: Command) {
        self.commands.push(command);
    }
}

/// A storyboard command: a value command or an opaque group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Plain value command
    Basic(BasicCommand),
    /// Loop group
    Loop(LoopCommand),
    /// Trigger group
    Trigger(TriggerCommand),
}

impl Command {
    /// Kind tag of this command
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Basic(c) => c.kind,
            Self::Loop(_) => CommandKind::Loop,
            Self::Trigger(_) => CommandKind::Trigger,
        }
    }

    /// Start time; for loops the absolute start of the first iteration
    pub fn start_time(&self) -> f64 {
        match self {
            Self::Basic(c) => c.start_time,
            Self::Loop(c) => c.start_time,
            Self::Trigger(c) => c.start_time,
        }
    }

    /// End time; for loops the absolute end over all iterations
    pub fn end_time(&self) -> f64 {
        match self {
            Self::Basic(c) => c.end_time,
            Self::Loop(c) => c.end_time(),
            Self::Trigger(c) => c.end_time,
        }
    }

    /// Move command between two positions
    pub fn move_to(easing: Easing, start_time: f64, end_time: f64, from: [f64; 2], to: [f64; 2]) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Move,
            easing,
            start_time,
            end_time,
            CommandValue::Vec2(from),
            CommandValue::Vec2(to),
        ))
    }

    /// Fade command between two opacities
    pub fn fade(easing: Easing, start_time: f64, end_time: f64, from: f64, to: f64) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Fade,
            easing,
            start_time,
            end_time,
            CommandValue::Float(from),
            CommandValue::Float(to),
        ))
    }

    /// Uniform scale command
    pub fn scale(easing: Easing, start_time: f64, end_time: f64, from: f64, to: f64) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Scale,
            easing,
            start_time,
            end_time,
            CommandValue::Float(from),
            CommandValue::Float(to),
        ))
    }

    /// Rotation command in radians
    pub fn rotate(easing: Easing, start_time: f64, end_time: f64, from: f64, to: f64) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Rotate,
            easing,
            start_time,
            end_time,
            CommandValue::Float(from),
            CommandValue::Float(to),
        ))
    }

    /// Color command between two tints
    pub fn color(easing: Easing, start_time: f64, end_time: f64, from: [f64; 3], to: [f64; 3]) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Color,
            easing,
            start_time,
            end_time,
            CommandValue::Color(from),
            CommandValue::Color(to),
        ))
    }

    /// Parameter toggle held over a time range
    pub fn parameter(easing: Easing, start_time: f64, end_time: f64, parameter: ParameterKind) -> Self {
        Self::Basic(BasicCommand::new(
            CommandKind::Parameter,
            easing,
            start_time,
            end_time,
            CommandValue::Parameter(parameter),
            CommandValue::Parameter(parameter),
        ))
    }
}
