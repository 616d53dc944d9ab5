// SPDX-License-Identifier: MIT OR Apache-2.0
//! Derived display state for sprite-like objects.
//!
//! Each command family keeps its own display timeline. The timelines are
//! derived from the command list and rebuilt whenever the list is replaced;
//! loops and triggers contribute their children inside a group span.

use crate::command::{sanitize_time, Command, CommandKind, CommandValue, ParameterKind};
use crate::easing::Easing;
use serde::{Deserialize, Serialize};

/// Enclosing group context of a display segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupSpan {
    /// Segment repeats inside a loop
    Loop {
        /// Absolute start of the first iteration
        start_time: f64,
        /// Iteration count
        loop_count: u32,
    },
    /// Segment plays when a trigger fires inside a window
    Trigger {
        /// Trigger condition name
        name: String,
        /// Window start
        start_time: f64,
        /// Window end
        end_time: f64,
    },
}

/// One segment of a display timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySegment {
    /// Easing across the segment
    pub easing: Easing,
    /// Segment start; absolute, or first-iteration absolute inside a loop
    pub start_time: f64,
    /// Segment end
    pub end_time: f64,
    /// Value at the start
    pub start_value: CommandValue,
    /// Value at the end
    pub end_value: CommandValue,
    /// Group context, if the segment came from a loop or trigger
    pub group: Option<GroupSpan>,
}

/// Ordered display segments for one command family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayTimeline {
    segments: Vec<DisplaySegment>,
}

impl DisplayTimeline {
    /// All segments, in command-list order
    pub fn segments(&self) -> &[DisplaySegment] {
        &self.segments
    }

    /// Whether the timeline has any segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    fn clear(&mut self) {
        self.segments.clear();
    }

    fn push(&mut self, segment: DisplaySegment) {
        self.segments.push(segment);
    }
}

/// Derived display state kept consistent with a sprite's command list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    /// 2D position
    pub position: DisplayTimeline,
    /// Horizontal position
    pub position_x: DisplayTimeline,
    /// Vertical position
    pub position_y: DisplayTimeline,
    /// Uniform scale
    pub scale: DisplayTimeline,
    /// Per-axis scale
    pub scale_vec: DisplayTimeline,
    /// Rotation
    pub rotation: DisplayTimeline,
    /// Opacity
    pub opacity: DisplayTimeline,
    /// Tint
    pub color: DisplayTimeline,
    /// Horizontal flip
    pub flip_h: DisplayTimeline,
    /// Vertical flip
    pub flip_v: DisplayTimeline,
    /// Additive blending
    pub additive: DisplayTimeline,
    /// Whether any trigger group is present
    pub has_trigger: bool,
    /// Earliest command start over the whole list
    pub commands_start_time: f64,
    /// Latest command end over the whole list
    pub commands_end_time: f64,
}

impl DisplayState {
    fn clear(&mut self) {
        self.position.clear();
        self.position_x.clear();
        self.position_y.clear();
        self.scale.clear();
        self.scale_vec.clear();
        self.rotation.clear();
        self.opacity.clear();
        self.color.clear();
        self.flip_h.clear();
        self.flip_v.clear();
        self.additive.clear();
        self.has_trigger = false;
        self.commands_start_time = 0.0;
        self.commands_end_time = 0.0;
    }

    fn family_for(&mut self, kind: CommandKind, start_value: &CommandValue) -> Option<&mut DisplayTimeline> {
        match kind {
            CommandKind::Move => Some(&mut self.position),
            CommandKind::MoveX => Some(&mut self.position_x),
            CommandKind::MoveY => Some(&mut self.position_y),
            CommandKind::Scale => Some(&mut self.scale),
            CommandKind::ScaleVec => Some(&mut self.scale_vec),
            CommandKind::Rotate => Some(&mut self.rotation),
            CommandKind::Fade => Some(&mut self.opacity),
            CommandKind::Color => Some(&mut self.color),
            CommandKind::Parameter => match start_value.as_parameter() {
                Some(ParameterKind::FlipH) => Some(&mut self.flip_h),
                Some(ParameterKind::FlipV) => Some(&mut self.flip_v),
                Some(ParameterKind::Additive) => Some(&mut self.additive),
                None => None,
            },
            CommandKind::Loop | CommandKind::Trigger => None,
        }
    }
}

/// Rebuild the display state from a command list.
///
/// Total: commands routed to a missing family are skipped, never an error.
pub(crate) fn rebuild(state: &mut DisplayState, commands: &[Command]) {
    state.clear();

    let mut start = f64::INFINITY;
    let mut end = f64::NEG_INFINITY;
    for command in commands {
        start = start.min(sanitize_time(command.start_time()));
        end = end.max(sanitize_time(command.end_time()));
        walk(state, command, 0.0, None);
    }

    if start.is_finite() && end.is_finite() {
        state.commands_start_time = start;
        state.commands_end_time = end;
    }
}

fn walk(state: &mut DisplayState, command: &Command, time_offset: f64, group: Option<&GroupSpan>) {
    match command {
        Command::Basic(basic) => {
            if let Some(timeline) = state.family_for(basic.kind, &basic.start_value) {
                timeline.push(DisplaySegment {
                    easing: basic.easing,
                    start_time: sanitize_time(basic.start_time) + time_offset,
                    end_time: sanitize_time(basic.end_time) + time_offset,
                    start_value: basic.start_value,
                    end_value: basic.end_value,
                    group: group.cloned(),
                });
            }
        }
        Command::Loop(looped) => {
            let start_time = time_offset + sanitize_time(looped.start_time);
            let span = GroupSpan::Loop {
                start_time,
                loop_count: looped.loop_count,
            };
            for inner in &looped.commands {
                walk(state, inner, start_time, Some(&span));
            }
        }
        Command::Trigger(trigger) => {
            state.has_trigger = true;
            let span = GroupSpan::Trigger {
                name: trigger.trigger_name.clone(),
                start_time: sanitize_time(trigger.start_time),
                end_time: sanitize_time(trigger.end_time),
            };
            for inner in &trigger.commands {
                walk(state, inner, 0.0, Some(&span));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_routes_families() {
        let mut state = DisplayState::default();
        let commands = vec![
            Command::move_to(Easing::None, 0.0, 1000.0, [0.0, 0.0], [320.0, 240.0]),
            Command::fade(Easing::Out, 0.0, 500.0, 0.0, 1.0),
            Command::parameter(Easing::None, 0.0, 1000.0, ParameterKind::Additive),
        ];
        rebuild(&mut state, &commands);

        assert_eq!(state.position.len(), 1);
        assert_eq!(state.opacity.len(), 1);
        assert_eq!(state.additive.len(), 1);
        assert!(state.flip_h.is_empty());
        assert!(!state.has_trigger);
        assert_eq!(state.commands_start_time, 0.0);
        assert_eq!(state.commands_end_time, 1000.0);
    }

    #[test]
    fn test_loop_offsets_children_and_spans_iterations() {
        let mut looped = crate::command::LoopCommand::new(2000.0, 4);
        looped.add(Command::fade(Easing::None, 0.0, 250.0, 0.0, 1.0));
        let commands = vec![Command::Loop(looped)];

        let mut state = DisplayState::default();
        rebuild(&mut state, &commands);

        let segment = &state.opacity.segments()[0];
        assert_eq!(segment.start_time, 2000.0);
        assert_eq!(segment.end_time, 2250.0);
        assert!(matches!(
            segment.group,
            Some(GroupSpan::Loop { loop_count: 4, .. })
        ));
        // 4 iterations of 250ms starting at 2000
        assert_eq!(state.commands_end_time, 3000.0);
    }

    #[test]
    fn test_trigger_sets_flag() {
        let mut trigger = crate::command::TriggerCommand::new("HitSoundClap", 0.0, 10_000.0, 0);
        trigger.add(Command::fade(Easing::None, 0.0, 100.0, 1.0, 0.0));
        let commands = vec![Command::Trigger(trigger)];

        let mut state = DisplayState::default();
        rebuild(&mut state, &commands);

        assert!(state.has_trigger);
        assert_eq!(state.opacity.len(), 1);
        assert!(matches!(
            state.opacity.segments()[0].group,
            Some(GroupSpan::Trigger { .. })
        ));
    }

    #[test]
    fn test_empty_rebuild_zeroes_cumulants() {
        let mut state = DisplayState::default();
        rebuild(&mut state, &[]);
        assert_eq!(state.commands_start_time, 0.0);
        assert_eq!(state.commands_end_time, 0.0);
        assert!(!state.has_trigger);
    }

    #[test]
    fn test_rebuild_replaces_previous_state() {
        let mut state = DisplayState::default();
        rebuild(
            &mut state,
            &[Command::fade(Easing::None, 0.0, 100.0, 0.0, 1.0)],
        );
        rebuild(
            &mut state,
            &[Command::scale(Easing::None, 500.0, 900.0, 1.0, 2.0)],
        );
        assert!(state.opacity.is_empty());
        assert_eq!(state.scale.len(), 1);
        assert_eq!(state.commands_start_time, 500.0);
        assert_eq!(state.commands_end_time, 900.0);
    }
}
