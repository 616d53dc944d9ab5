// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor runtime for OsbPlay Editor.
//!
//! This crate wires the coordinator core into the editor:
//! - Layers and the shared storyboard contexts generators observe
//! - Generator contexts: the facade one script run sees
//! - The effect lifecycle driving scripts with cancellation
//! - The ordered list of editor-visible layers
//! - Dependency watching and FFT audio stream caching
//!
//! ## Architecture
//!
//! Shared-mutable state is limited to the storyboard contexts and the
//! per-layer coordinators, each behind its own lock; everything else is
//! caller-driven and synchronous. The runtime owns no threads.

pub mod audio;
pub mod cancellation;
pub mod context;
pub mod effect;
pub mod error;
pub mod generator;
pub mod layer;
pub mod layer_manager;
pub mod watcher;

pub use audio::{FftSource, FftSourceFactory, FftStreamCache};
pub use cancellation::CancellationToken;
pub use context::{
    default_layer_factory, LayerCreatedCallback, LayerFactory, SharedContextPool,
    StoryboardContext, SubscriptionId,
};
pub use effect::{Effect, EffectOutcome, EffectStatus, Script, ScriptLoadError, ScriptProvider};
pub use error::{ContextError, GeneratorError};
pub use generator::{Beatmap, GeneratorContext, GeneratorRun, ProjectPaths};
pub use layer::{Layer, LayerIdentifier};
pub use layer_manager::LayerManager;
pub use watcher::DependencyWatcher;
