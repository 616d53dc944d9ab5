// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic command fusion.
//!
//! [`fuse`] takes the command list of a single object and returns a fused,
//! deterministically ordered copy: overlapping and edge-touching commands of
//! the same kind collapse into one command spanning the group, everything
//! else clones through. Inputs are never mutated.
//!
//! The pipeline is snapshot/classify, per-kind sort, ε-merge, emit, final
//! sort. Command groups (loops, triggers) and unsupported kinds bypass the
//! merge and clone through unchanged.

use crate::kind_registry::{KindDescriptor, KindRegistry};
use indexmap::IndexMap;
use osbplay_editor_storyboard::{sanitize_time, BasicCommand, Command, CommandKind};
use std::cmp::Ordering;

/// Tolerance for merge decisions: edge-touching commands (`a.end == b.start`)
/// count as overlapping, and spans no longer than this count as zero-duration.
pub const MERGE_EPSILON: f64 = 1e-4;

/// Parameters of one fusion call's final ordering.
///
/// The object and contributor keys are constant within one call; they keep
/// outputs totally ordered when callers pool results across objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderingContext {
    /// Tracked-entry sequence of the object being fused
    pub object_order: u64,
    /// Priority of the attributed contributor
    pub contributor_priority: i32,
    /// Registration order of the attributed contributor
    pub contributor_order: u64,
    /// Base offset for snapshot indices, disjoint per object
    pub snapshot_base: u64,
}

impl OrderingContext {
    /// Final deterministic tiebreaker for the output at `index`
    pub fn snapshot_index(&self, index: usize) -> u64 {
        self.snapshot_base.saturating_add(index as u64)
    }
}

/// The full sort key of one fused output
#[derive(Debug, Clone)]
struct FusionSortKey {
    object_order: u64,
    type_key: &'static str,
    start_time: f64,
    end_time: f64,
    contributor_priority: i32,
    contributor_order: u64,
    snapshot_index: u64,
}

impl FusionSortKey {
    fn compare(&self, other: &Self) -> Ordering {
        self.object_order
            .cmp(&other.object_order)
            .then_with(|| self.type_key.cmp(other.type_key))
            .then_with(|| self.start_time.total_cmp(&other.start_time))
            .then_with(|| self.end_time.total_cmp(&other.end_time))
            .then_with(|| self.contributor_priority.cmp(&other.contributor_priority))
            .then_with(|| self.contributor_order.cmp(&other.contributor_order))
            .then_with(|| self.snapshot_index.cmp(&other.snapshot_index))
    }
}

/// One supported command captured during classification.
///
/// Times are sanitized once here; every later decision reads these fields.
struct Snapshot<'a> {
    command: &'a BasicCommand,
    descriptor: KindDescriptor,
    start_time: f64,
    end_time: f64,
    index: usize,
}

impl Snapshot<'_> {
    fn is_zero_duration(&self) -> bool {
        (self.end_time - self.start_time).abs() <= MERGE_EPSILON
    }

    /// Clone through, reflecting the sanitized times
    fn clone_through(&self) -> BasicCommand {
        let mut command = self.descriptor.clone_command(self.command);
        command.start_time = self.start_time;
        command.end_time = self.end_time;
        command
    }
}

struct Emitted {
    command: Command,
    key: FusionSortKey,
}

/// A run of overlapping same-kind snapshots being merged
struct MergeGroup<'a> {
    members: Vec<Snapshot<'a>>,
    first: usize,
    last: usize,
    end_time: f64,
}

impl<'a> MergeGroup<'a> {
    fn start(record: Snapshot<'a>) -> Self {
        let end_time = record.end_time;
        Self {
            members: vec![record],
            first: 0,
            last: 0,
            end_time,
        }
    }

    fn overlaps(&self, record: &Snapshot<'a>) -> bool {
        record.start_time <= self.end_time + MERGE_EPSILON
    }

    fn absorb(&mut self, record: Snapshot<'a>) {
        self.end_time = self.end_time.max(record.end_time);
        let index = self.members.len();

        let first = &self.members[self.first];
        if record.start_time < first.start_time
            || (record.start_time == first.start_time && record.index < first.index)
        {
            self.first = index;
        }

        let last = &self.members[self.last];
        if record.end_time > last.end_time
            || (record.end_time == last.end_time && record.index > last.index)
        {
            self.last = index;
        }

        self.members.push(record);
    }
}

/// Fuse one object's command list.
///
/// Deterministic and idempotent; the input is left untouched and every
/// output is freshly constructed.
pub fn fuse(commands: &[Command], ctx: &OrderingContext, registry: &KindRegistry) -> Vec<Command> {
    let mut emitted: Vec<Emitted> = Vec::with_capacity(commands.len());
    let mut buckets: IndexMap<CommandKind, Vec<Snapshot<'_>>> = IndexMap::new();

    // Snapshot & classify
    for (index, command) in commands.iter().enumerate() {
        match command {
            Command::Loop(_) | Command::Trigger(_) => {
                // Groups are opaque: deep-clone and emit as-is
                emit(&mut emitted, command.clone(), ctx, index);
            }
            Command::Basic(basic) => {
                let descriptor = registry.lookup(basic.kind);
                if !descriptor.supported {
                    emit(&mut emitted, Command::Basic(basic.clone()), ctx, index);
                    continue;
                }
                buckets.entry(basic.kind).or_default().push(Snapshot {
                    start_time: sanitize_time(descriptor.start_time(basic)),
                    end_time: sanitize_time(descriptor.end_time(basic)),
                    command: basic,
                    descriptor,
                    index,
                });
            }
        }
    }

    // Sort and merge within each kind
    for (_, mut records) in buckets {
        records.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.end_time.total_cmp(&b.end_time))
                .then_with(|| a.index.cmp(&b.index))
        });

        let mut group: Option<MergeGroup<'_>> = None;
        for record in records {
            if record.is_zero_duration() {
                // Point-in-time commands never join a group
                if let Some(done) = group.take() {
                    flush(&mut emitted, done, ctx);
                }
                let index = record.index;
                emit(&mut emitted, Command::Basic(record.clone_through()), ctx, index);
                continue;
            }

            group = Some(match group.take() {
                Some(mut current) if current.overlaps(&record) => {
                    current.absorb(record);
                    current
                }
                Some(done) => {
                    flush(&mut emitted, done, ctx);
                    MergeGroup::start(record)
                }
                None => MergeGroup::start(record),
            });
        }
        if let Some(done) = group.take() {
            flush(&mut emitted, done, ctx);
        }
    }

    // Final deterministic ordering
    emitted.sort_by(|a, b| a.key.compare(&b.key));
    emitted.into_iter().map(|e| e.command).collect()
}

fn emit(emitted: &mut Vec<Emitted>, command: Command, ctx: &OrderingContext, index: usize) {
    let key = FusionSortKey {
        object_order: ctx.object_order,
        type_key: command.kind().type_key(),
        start_time: sanitize_time(command.start_time()),
        end_time: sanitize_time(command.end_time()),
        contributor_priority: ctx.contributor_priority,
        contributor_order: ctx.contributor_order,
        snapshot_index: ctx.snapshot_index(index),
    };
    emitted.push(Emitted { command, key });
}

fn flush(emitted: &mut Vec<Emitted>, group: MergeGroup<'_>, ctx: &OrderingContext) {
    if group.members.len() == 1 {
        let record = &group.members[0];
        let index = record.index;
        emit(emitted, Command::Basic(record.clone_through()), ctx, index);
        return;
    }

    let first = &group.members[group.first];
    let last = &group.members[group.last];
    let descriptor = &first.descriptor;

    let easing = descriptor.easing(first.command);
    if group
        .members
        .iter()
        .any(|m| m.descriptor.easing(m.command) != easing)
    {
        // Earliest wins; surfacing this as a caller-facing warning is deferred
        tracing::debug!(
            kind = ?descriptor.kind,
            members = group.members.len(),
            "merged commands with conflicting easing"
        );
    }

    let fused = descriptor.create(
        easing,
        first.start_time,
        last.end_time,
        descriptor.start_value(first.command),
        descriptor.end_value(last.command),
    );

    match fused {
        Some(command) => {
            let index = first.index;
            emit(emitted, Command::Basic(command), ctx, index);
        }
        None => {
            // Factory refused; every member survives individually
            for record in &group.members {
                let index = record.index;
                emit(emitted, Command::Basic(record.clone_through()), ctx, index);
            }
        }
    }
}
