// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layer command coordinator for OsbPlay Editor.
//!
//! This crate provides the deterministic heart of the editor:
//! - Command kind descriptors driving type-polymorphic fusion
//! - The pure fusion engine merging overlapping same-kind commands
//! - Contributor identity and attribution
//! - The per-layer coordinator producing deterministic object orderings
//!   and driving fusion recursively through nested segments
//!
//! ## Architecture
//!
//! Fusion is a pure function over value types; all shared-mutable state
//! lives behind one `parking_lot::Mutex` per coordinator instance.

pub mod contributor;
pub mod coordinator;
pub mod fusion;
pub mod kind_registry;

pub use contributor::{Contributor, ContributorId};
pub use coordinator::{CommandFusionResult, LayerCommandCoordinator, TrackedEntry};
pub use fusion::{fuse, OrderingContext, MERGE_EPSILON};
pub use kind_registry::{KindDescriptor, KindRegistry};
