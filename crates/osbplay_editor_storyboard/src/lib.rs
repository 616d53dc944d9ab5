// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storyboard object model for OsbPlay Editor.
//!
//! This crate provides the value types contributors emit into layers:
//! - Commands (move, fade, scale, ...) with easing tags
//! - Loop and trigger command groups
//! - Sprites, animations, samples and nested segments
//! - Derived display state rebuilt from a sprite's command list
//!
//! ## Architecture
//!
//! Everything here is value-like and lock-free; shared ownership and
//! ordering live in the coordinator and runtime crates.

pub mod command;
pub mod display;
pub mod easing;
pub mod object;

pub use command::{
    sanitize_time, BasicCommand, Command, CommandKind, CommandValue, LoopCommand, ParameterKind,
    TriggerCommand,
};
pub use display::{DisplaySegment, DisplayState, DisplayTimeline, GroupSpan};
pub use easing::Easing;
pub use object::{
    Animation, LoopType, ObjectId, Origin, Sample, Segment, Sprite, StoryboardObject,
};
