// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command kind descriptors.
//!
//! The fusion engine never matches on concrete command kinds; it works
//! through a descriptor looked up here. Each descriptor carries accessors,
//! a fused-instance factory and the flags fusion needs. Kinds without a
//! registered descriptor resolve to an unsupported one that clones through.

use indexmap::IndexMap;
use osbplay_editor_storyboard::{BasicCommand, CommandKind, CommandValue, Easing};

/// Descriptor for one command kind
#[derive(Clone, Copy)]
pub struct KindDescriptor {
    /// Described kind
    pub kind: CommandKind,
    /// Stable key used for deterministic cross-kind ordering
    pub type_key: &'static str,
    /// Whether fusion may merge commands of this kind
    pub supported: bool,
    /// Whether the kind carries a single value rather than a start/end pair
    pub point_like: bool,
    start_time: fn(&BasicCommand) -> f64,
    end_time: fn(&BasicCommand) -> f64,
    start_value: fn(&BasicCommand) -> CommandValue,
    end_value: fn(&BasicCommand) -> CommandValue,
    easing: fn(&BasicCommand) -> Easing,
    accepts: fn(&CommandValue) -> bool,
}

fn read_start_time(command: &BasicCommand) -> f64 {
    command.start_time
}

fn read_end_time(command: &BasicCommand) -> f64 {
    command.end_time
}

fn read_start_value(command: &BasicCommand) -> CommandValue {
    command.start_value
}

fn read_end_value(command: &BasicCommand) -> CommandValue {
    command.end_value
}

fn read_easing(command: &BasicCommand) -> Easing {
    command.easing
}

fn accepts_vec2(value: &CommandValue) -> bool {
    value.as_vec2().is_some()
}

fn accepts_float(value: &CommandValue) -> bool {
    value.as_float().is_some()
}

fn accepts_color(value: &CommandValue) -> bool {
    value.as_color().is_some()
}

fn accepts_parameter(value: &CommandValue) -> bool {
    value.as_parameter().is_some()
}

fn accepts_nothing(_: &CommandValue) -> bool {
    false
}

impl KindDescriptor {
    fn value_kind(kind: CommandKind, accepts: fn(&CommandValue) -> bool) -> Self {
        Self {
            kind,
            type_key: kind.type_key(),
            supported: true,
            point_like: false,
            start_time: read_start_time,
            end_time: read_end_time,
            start_value: read_start_value,
            end_value: read_end_value,
            easing: read_easing,
            accepts,
        }
    }

    fn point_kind(kind: CommandKind, accepts: fn(&CommandValue) -> bool) -> Self {
        Self {
            point_like: true,
            ..Self::value_kind(kind, accepts)
        }
    }

    /// Descriptor for a kind fusion must clone through
    pub fn unsupported(kind: CommandKind) -> Self {
        Self {
            kind,
            type_key: kind.type_key(),
            supported: false,
            point_like: false,
            start_time: read_start_time,
            end_time: read_end_time,
            start_value: read_start_value,
            end_value: read_end_value,
            easing: read_easing,
            accepts: accepts_nothing,
        }
    }

    /// Read the command's start time
    pub fn start_time(&self, command: &BasicCommand) -> f64 {
        (self.start_time)(command)
    }

    /// Read the command's end time
    pub fn end_time(&self, command: &BasicCommand) -> f64 {
        (self.end_time)(command)
    }

    /// Read the command's start value
    pub fn start_value(&self, command: &BasicCommand) -> CommandValue {
        (self.start_value)(command)
    }

    /// Read the command's end value
    pub fn end_value(&self, command: &BasicCommand) -> CommandValue {
        (self.end_value)(command)
    }

    /// Read the command's easing tag
    pub fn easing(&self, command: &BasicCommand) -> Easing {
        (self.easing)(command)
    }

    /// Build a fused instance.
    ///
    /// Refuses (returns `None`) when the kind is unsupported, when either
    /// value does not fit the kind, or when a point-like kind is asked for
    /// two distinct values. Callers clone through on refusal.
    pub fn create(
        &self,
        easing: Easing,
        start_time: f64,
        end_time: f64,
        start_value: CommandValue,
        end_value: CommandValue,
    ) -> Option<BasicCommand> {
        if !self.supported {
            return None;
        }
        if !(self.accepts)(&start_value) || !(self.accepts)(&end_value) {
            return None;
        }
        if self.point_like && start_value != end_value {
            return None;
        }
        Some(BasicCommand::new(
            self.kind,
            easing,
            start_time,
            end_time,
            start_value,
            end_value,
        ))
    }

    /// Clone a command of this kind
    pub fn clone_command(&self, command: &BasicCommand) -> BasicCommand {
        command.clone()
    }
}

impl std::fmt::Debug for KindDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindDescriptor")
            .field("kind", &self.kind)
            .field("type_key", &self.type_key)
            .field("supported", &self.supported)
            .field("point_like", &self.point_like)
            .finish()
    }
}

/// Registry of kind descriptors, keyed by command kind
#[derive(Debug, Clone)]
pub struct KindRegistry {
    descriptors: IndexMap<CommandKind, KindDescriptor>,
}

impl KindRegistry {
    /// Registry covering every built-in value kind
    pub fn builtin() -> Self {
        let mut registry = Self {
            descriptors: IndexMap::new(),
        };
        registry.register(KindDescriptor::value_kind(CommandKind::Move, accepts_vec2));
        registry.register(KindDescriptor::value_kind(CommandKind::MoveX, accepts_float));
        registry.register(KindDescriptor::value_kind(CommandKind::MoveY, accepts_float));
        registry.register(KindDescriptor::value_kind(CommandKind::Scale, accepts_float));
        registry.register(KindDescriptor::value_kind(CommandKind::ScaleVec, accepts_vec2));
        registry.register(KindDescriptor::value_kind(CommandKind::Rotate, accepts_float));
        registry.register(KindDescriptor::value_kind(CommandKind::Fade, accepts_float));
        registry.register(KindDescriptor::value_kind(CommandKind::Color, accepts_color));
        registry.register(KindDescriptor::point_kind(
            CommandKind::Parameter,
            accepts_parameter,
        ));
        registry
    }

    /// Register or replace a descriptor
    pub fn register(&mut self, descriptor: KindDescriptor) {
        self.descriptors.insert(descriptor.kind, descriptor);
    }

    /// Remove a descriptor; its kind falls back to clone-through
    pub fn unregister(&mut self, kind: CommandKind) -> Option<KindDescriptor> {
        self.descriptors.shift_remove(&kind)
    }

    /// Look up the descriptor for a kind.
    ///
    /// Total: unknown kinds (including the group kinds) resolve to an
    /// unsupported descriptor rather than an error.
    pub fn lookup(&self, kind: CommandKind) -> KindDescriptor {
        self.descriptors
            .get(&kind)
            .copied()
            .unwrap_or_else(|| KindDescriptor::unsupported(kind))
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
