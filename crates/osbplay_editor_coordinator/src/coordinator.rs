// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-layer registry of contributors, objects and attribution.
//!
//! One coordinator lives on each layer. It owns contributor registration,
//! object tracking, the deterministic object ordering, and drives fusion
//! recursively through nested segments. Every public operation is total:
//! invalid inputs degrade to no-ops, unknown contributors remap to the
//! default sentinel.

use crate::contributor::{Contributor, ContributorId};
use crate::fusion::{fuse, OrderingContext};
use crate::kind_registry::KindRegistry;
use indexmap::IndexMap;
use osbplay_editor_storyboard::{ObjectId, StoryboardObject};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot-index stride keeping per-object index ranges disjoint
const SNAPSHOT_STRIDE: u64 = 1 << 20;

/// Outcome of one sprite's fusion pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFusionResult {
    /// The processed sprite-like object
    pub object: ObjectId,
    /// Command count before fusion
    pub original_count: usize,
    /// Command count after fusion
    pub fused_count: usize,
}

impl CommandFusionResult {
    /// Whether fusion shortened the command list
    pub fn has_fusion(&self) -> bool {
        self.fused_count < self.original_count
    }
}

/// Tracking record for one object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEntry {
    /// The tracked object
    pub object: ObjectId,
    /// Attributed contributor
    pub contributor: ContributorId,
    /// Monotonic tie-breaker assigned at first sight
    pub sequence: u64,
    /// Cached start time, refreshed before ordering
    pub start_time: f64,
    /// Cached end time, refreshed before ordering
    pub end_time: f64,
}

#[derive(Debug, Clone, Copy)]
struct OrderKey {
    object: ObjectId,
    start_time: f64,
    priority: i32,
    order: u64,
    end_time: f64,
    sequence: u64,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    contributors: IndexMap<ContributorId, Contributor>,
    entries: HashMap<ObjectId, TrackedEntry>,
    scratch: Vec<OrderKey>,
    next_sequence: u64,
    next_contributor_order: u64,
}

impl CoordinatorState {
    fn find_or_create(&mut self, object: ObjectId) -> &mut TrackedEntry {
        let next_sequence = &mut self.next_sequence;
        self.entries.entry(object).or_insert_with(|| {
            let sequence = *next_sequence;
            *next_sequence += 1;
            TrackedEntry {
                object,
                contributor: ContributorId::NIL,
                sequence,
                start_time: 0.0,
                end_time: 0.0,
            }
        })
    }

    fn ensure_contributor(&mut self, id: ContributorId) {
        if id.is_nil() || self.contributors.contains_key(&id) {
            return;
        }
        let order = self.next_contributor_order;
        self.next_contributor_order += 1;
        self.contributors.insert(id, Contributor::new(id, "", order, 0));
    }

    /// Sort keys of a contributor; unknown ids fall back to the sentinel
    fn contributor_keys(&self, id: ContributorId) -> (i32, u64) {
        match self.contributors.get(&id) {
            Some(c) => (c.priority, c.order),
            None => {
                let fallback = Contributor::fallback();
                (fallback.priority, fallback.order)
            }
        }
    }
}

/// Registry coordinating one layer's contributors and command fusion
#[derive(Debug, Default)]
pub struct LayerCommandCoordinator {
    state: Mutex<CoordinatorState>,
}

impl LayerCommandCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contributor; no-op when the id is nil or already present
    pub fn register_contributor(&self, id: ContributorId, name: &str, priority: i32) {
        if id.is_nil() {
            return;
        }
        let mut state = self.state.lock();
        if state.contributors.contains_key(&id) {
            return;
        }
        let order = state.next_contributor_order;
        state.next_contributor_order += 1;
        state
            .contributors
            .insert(id, Contributor::new(id, name, order, priority));
    }

    /// Update a contributor's priority in place; silent no-op when absent
    pub fn update_contributor_priority(&self, id: ContributorId, priority: i32) {
        let mut state = self.state.lock();
        if let Some(contributor) = state.contributors.get_mut(&id) {
            contributor.priority = priority;
        }
    }

    /// Look up a registered contributor
    pub fn contributor(&self, id: ContributorId) -> Option<Contributor> {
        self.state.lock().contributors.get(&id).cloned()
    }

    /// Number of registered contributors
    pub fn contributor_count(&self) -> usize {
        self.state.lock().contributors.len()
    }

    /// Track an object against a contributor, registering the contributor
    /// on first sight and re-attributing the object when already tracked.
    pub fn track(&self, object: ObjectId, contributor: ContributorId) {
        let mut state = self.state.lock();
        state.ensure_contributor(contributor);
        state.find_or_create(object).contributor = contributor;
    }

    /// Stop tracking an object; no-op when untracked
    pub fn untrack(&self, object: ObjectId) {
        self.state.lock().entries.remove(&object);
    }

    /// Whether an object is tracked
    pub fn is_tracked(&self, object: ObjectId) -> bool {
        self.state.lock().entries.contains_key(&object)
    }

    /// Number of tracked objects
    pub fn tracked_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Compute the deterministic object order.
    ///
    /// Refreshes every entry's cached times, remaps unknown contributors to
    /// the default sentinel, and sorts by
    /// `(start, contributor priority, contributor order, end, sequence)`.
    /// Returns `None` when the input is already in order.
    pub fn try_build_ordered(&self, objects: &[StoryboardObject]) -> Option<Vec<ObjectId>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut keys = std::mem::take(&mut state.scratch);
        keys.clear();

        for object in objects {
            let id = object.id();
            let start_time = object.start_time();
            let end_time = object.end_time();

            let entry = state.find_or_create(id);
            entry.start_time = start_time;
            entry.end_time = end_time;
            let sequence = entry.sequence;
            let mut contributor = entry.contributor;

            if !contributor.is_nil() && !state.contributors.contains_key(&contributor) {
                tracing::debug!(object = ?id, contributor = ?contributor, "unknown contributor, remapping to default");
                contributor = ContributorId::NIL;
                state.find_or_create(id).contributor = contributor;
            }

            let (priority, order) = state.contributor_keys(contributor);
            keys.push(OrderKey {
                object: id,
                start_time,
                priority,
                order,
                end_time,
                sequence,
            });
        }

        keys.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.order.cmp(&b.order))
                .then_with(|| a.end_time.total_cmp(&b.end_time))
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        let changed = keys
            .iter()
            .zip(objects)
            .any(|(key, object)| key.object != object.id());
        let ordered = changed.then(|| keys.iter().map(|key| key.object).collect());

        state.scratch = keys;
        ordered
    }

    /// Fuse every sprite-like object's commands, recursing through segments.
    ///
    /// Returns one [`CommandFusionResult`] per processed sprite.
    pub fn merge_commands(
        &self,
        objects: &mut [StoryboardObject],
        registry: &KindRegistry,
    ) -> Vec<CommandFusionResult> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut results = Vec::new();
        for object in objects.iter_mut() {
            merge_object(state, object, registry, &mut results);
        }
        results
    }
}

fn merge_object(
    state: &mut CoordinatorState,
    object: &mut StoryboardObject,
    registry: &KindRegistry,
    results: &mut Vec<CommandFusionResult>,
) {
    let id = object.id();
    let entry = state.find_or_create(id);
    let sequence = entry.sequence;
    let contributor = entry.contributor;

    if let Some(sprite) = object.as_sprite_mut() {
        let (contributor_priority, contributor_order) = state.contributor_keys(contributor);
        let ctx = OrderingContext {
            object_order: sequence,
            contributor_priority,
            contributor_order,
            snapshot_base: sequence.saturating_mul(SNAPSHOT_STRIDE),
        };

        let original = sprite.commands().to_vec();
        let fused = fuse(&original, &ctx, registry);
        let result = CommandFusionResult {
            object: id,
            original_count: original.len(),
            fused_count: fused.len(),
        };
        sprite.rebuild_display_state(fused);

        if result.has_fusion() {
            tracing::debug!(
                object = ?id,
                original = result.original_count,
                fused = result.fused_count,
                "fused sprite commands"
            );
        }
        results.push(result);
    } else if let Some(segment) = object.as_segment_mut() {
        for child in segment.children_mut() {
            merge_object(state, child, registry, results);
        }
    }
}
