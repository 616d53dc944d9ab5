// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generator contexts: the facade one script run sees.
//!
//! A context either owns its own layer map (local mode) or delegates layer
//! creation and lookup to a shared [`StoryboardContext`]. Every layer it
//! hands out has the run's contributor registered on it. The context also
//! carries the run's ambient state: project paths, beatmaps, FFT streams,
//! cancellation, the log accumulator and the dependency watcher.

use crate::audio::{FftSource, FftSourceFactory, FftStreamCache};
use crate::cancellation::CancellationToken;
use crate::context::{LayerFactory, StoryboardContext, SubscriptionId};
use crate::error::{ContextError, GeneratorError};
use crate::layer::{Layer, LayerIdentifier};
use crate::watcher::DependencyWatcher;
use indexmap::IndexMap;
use osbplay_editor_coordinator::Contributor;
use parking_lot::Mutex;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ambient filesystem locations of one run
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// The project file's directory
    pub project_path: PathBuf,
    /// Directory generator assets are read from
    pub asset_path: PathBuf,
    /// The mapset directory; must exist while the run reads it
    pub mapset_path: PathBuf,
}

/// Handle to a beatmap of the mapset.
///
/// Parsing is a collaborator's concern; the runtime only carries the handle
/// so it can record that a run depended on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beatmap {
    /// Difficulty name
    pub name: String,
    /// Audio file path
    pub audio_path: PathBuf,
}

type LayerObserver = Box<dyn Fn(&Arc<Layer>) + Send + Sync>;

enum LayerSource {
    Local(IndexMap<LayerIdentifier, Arc<Layer>>),
    Shared {
        context: Arc<StoryboardContext>,
        subscription: SubscriptionId,
    },
}

/// The facade a single script run uses to reach the editor
pub struct GeneratorContext {
    contributor: Contributor,
    paths: ProjectPaths,
    beatmaps: Vec<Arc<Beatmap>>,
    layer_factory: LayerFactory,
    source: Mutex<LayerSource>,
    accessed: Mutex<Vec<Arc<Layer>>>,
    accessed_observer: Mutex<Option<LayerObserver>>,
    created_observer: Arc<Mutex<Option<LayerObserver>>>,
    beatmap_dependent: AtomicBool,
    multithreaded: AtomicBool,
    active: AtomicBool,
    cancellation: CancellationToken,
    log: Mutex<Vec<String>>,
    fft_streams: FftStreamCache,
    watcher: Option<Arc<DependencyWatcher>>,
}

impl GeneratorContext {
    /// Create a local-mode context
    pub fn new(contributor: Contributor, paths: ProjectPaths) -> Self {
        Self {
            contributor,
            paths,
            beatmaps: Vec::new(),
            layer_factory: crate::context::default_layer_factory(),
            source: Mutex::new(LayerSource::Local(IndexMap::new())),
            accessed: Mutex::new(Vec::new()),
            accessed_observer: Mutex::new(None),
            created_observer: Arc::new(Mutex::new(None)),
            beatmap_dependent: AtomicBool::new(false),
            multithreaded: AtomicBool::new(false),
            active: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
            log: Mutex::new(Vec::new()),
            fft_streams: FftStreamCache::disabled(),
            watcher: None,
        }
    }

    /// Builder: the mapset's beatmaps
    pub fn with_beatmaps(mut self, beatmaps: Vec<Arc<Beatmap>>) -> Self {
        self.beatmaps = beatmaps;
        self
    }

    /// Builder: the FFT source factory
    pub fn with_fft_source_factory(mut self, factory: FftSourceFactory) -> Self {
        self.fft_streams = FftStreamCache::new(factory);
        self
    }

    /// Builder: the shared dependency watcher
    pub fn with_watcher(mut self, watcher: Arc<DependencyWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Builder: the run's cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The run's contributor identity
    pub fn contributor(&self) -> &Contributor {
        &self.contributor
    }

    /// Bind this context to a shared storyboard context, or back to local
    /// mode with `None`.
    ///
    /// The previous shared subscription is unhooked first; rebinding to the
    /// same context is a no-op.
    pub fn set_shared_context(&self, context: Option<Arc<StoryboardContext>>) {
        let mut source = self.source.lock();
        if let LayerSource::Shared {
            context: current,
            subscription,
        } = &*source
        {
            if let Some(next) = &context {
                if Arc::ptr_eq(current, next) {
                    return;
                }
            }
            current.unsubscribe(*subscription);
        }

        *source = match context {
            Some(context) => {
                // First factory wins; every generator then shares one layer kind
                context.attach_layer_factory(self.layer_factory.clone());
                let observer = self.created_observer.clone();
                let subscription = context.subscribe(Arc::new(move |layer| {
                    if let Some(callback) = &*observer.lock() {
                        callback(layer);
                    }
                }));
                LayerSource::Shared {
                    context,
                    subscription,
                }
            }
            None => LayerSource::Local(IndexMap::new()),
        };
    }

    /// Whether this context delegates to a shared storyboard context
    pub fn has_shared_context(&self) -> bool {
        matches!(&*self.source.lock(), LayerSource::Shared { .. })
    }

    /// The layer for an identifier; `None` addresses the unnamed slot.
    ///
    /// The returned layer has this run's contributor registered. Access and
    /// creation observers fire after the layer is resolved.
    pub fn get_layer(&self, name: Option<&str>) -> Result<Arc<Layer>, GeneratorError> {
        let identifier = LayerIdentifier::from_option(name);

        // Resolve the shared context without holding the source lock across
        // its creation events, so observers may re-enter this context.
        let shared = match &*self.source.lock() {
            LayerSource::Shared { context, .. } => Some(context.clone()),
            LayerSource::Local(_) => None,
        };

        let (layer, created_locally) = match shared {
            Some(context) => {
                // Creation events arrive through the shared subscription
                let layer = context.get_layer_with(&identifier, Some(&self.layer_factory))?;
                (layer, false)
            }
            None => {
                let mut source = self.source.lock();
                match &mut *source {
                    LayerSource::Local(layers) => match layers.get(&identifier) {
                        Some(layer) => (layer.clone(), false),
                        None => {
                            let layer = (self.layer_factory)(&identifier).ok_or_else(|| {
                                ContextError::LayerFactoryReturnedNull {
                                    identifier: identifier.clone(),
                                }
                            })?;
                            layers.insert(identifier, layer.clone());
                            (layer, true)
                        }
                    },
                    LayerSource::Shared { context, .. } => {
                        // The run switched to shared mode in between
                        let context = context.clone();
                        drop(source);
                        let layer =
                            context.get_layer_with(&identifier, Some(&self.layer_factory))?;
                        (layer, false)
                    }
                }
            }
        };

        layer.coordinator().register_contributor(
            self.contributor.id,
            &self.contributor.name,
            self.contributor.priority,
        );
        self.record_access(&layer);
        if let Some(observer) = &*self.accessed_observer.lock() {
            observer(&layer);
        }
        if created_locally {
            if let Some(observer) = &*self.created_observer.lock() {
                observer(&layer);
            }
        }
        Ok(layer)
    }

    fn record_access(&self, layer: &Arc<Layer>) {
        let mut accessed = self.accessed.lock();
        if !accessed.iter().any(|known| Arc::ptr_eq(known, layer)) {
            accessed.push(layer.clone());
        }
    }

    /// Every distinct layer this run has touched, in access order
    pub fn accessed_layers(&self) -> Vec<Arc<Layer>> {
        self.accessed.lock().clone()
    }

    /// Observe every layer access of this run
    pub fn on_layer_accessed(&self, observer: impl Fn(&Arc<Layer>) + Send + Sync + 'static) {
        *self.accessed_observer.lock() = Some(Box::new(observer));
    }

    /// Observe layer creations: local ones, and in shared mode every
    /// creation on the shared context while this context stays bound
    pub fn on_layer_created(&self, observer: impl Fn(&Arc<Layer>) + Send + Sync + 'static) {
        *self.created_observer.lock() = Some(Box::new(observer));
    }

    /// The project directory
    pub fn project_path(&self) -> &Path {
        &self.paths.project_path
    }

    /// The generator asset directory
    pub fn asset_path(&self) -> &Path {
        &self.paths.asset_path
    }

    /// The mapset directory; raises when it no longer exists
    pub fn mapset_path(&self) -> Result<&Path, GeneratorError> {
        let path = self.paths.mapset_path.as_path();
        if path.exists() {
            Ok(path)
        } else {
            Err(GeneratorError::MapsetMissing(path.to_path_buf()))
        }
    }

    /// The primary beatmap; reading it marks the run beatmap-dependent
    pub fn beatmap(&self) -> Option<Arc<Beatmap>> {
        self.beatmap_dependent.store(true, Ordering::SeqCst);
        self.beatmaps.first().cloned()
    }

    /// Every beatmap; reading them marks the run beatmap-dependent
    pub fn beatmaps(&self) -> Vec<Arc<Beatmap>> {
        self.beatmap_dependent.store(true, Ordering::SeqCst);
        self.beatmaps.clone()
    }

    /// Whether the run read any beatmap data
    pub fn is_beatmap_dependent(&self) -> bool {
        self.beatmap_dependent.load(Ordering::SeqCst)
    }

    /// Opt this run into multithreaded generation
    pub fn set_multithreaded(&self, multithreaded: bool) {
        self.multithreaded.store(multithreaded, Ordering::SeqCst);
    }

    /// Whether the run generates on multiple threads
    pub fn multithreaded(&self) -> bool {
        self.multithreaded.load(Ordering::SeqCst)
    }

    /// The run's cancellation token
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Append a line to the run log
    pub fn add_log(&self, message: impl Into<String>) {
        self.log.lock().push(message.into());
    }

    /// The accumulated run log
    pub fn log_text(&self) -> String {
        self.log.lock().join("\n")
    }

    /// Drop the accumulated run log
    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// The FFT stream for an audio path, opened on first use
    pub fn fft_source(&self, path: &Path) -> Result<Arc<dyn FftSource>, GeneratorError> {
        self.fft_streams
            .get(path)
            .map_err(|source| GeneratorError::AudioStream {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Magnitude spectrum of an audio file around `time`
    pub fn get_fft(
        &self,
        path: &Path,
        time: f64,
        split_channels: bool,
    ) -> Result<Vec<f32>, GeneratorError> {
        Ok(self.fft_source(path)?.get_fft(time, split_channels))
    }

    /// Declare a file this run's output depends on
    pub fn add_dependency(&self, path: &Path) {
        if let Some(watcher) = &self.watcher {
            watcher.watch(path);
        }
    }

    /// Whether a run handle is currently held
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Open the scoped run handle scripts receive.
    ///
    /// The handle marks this context current for the duration of the run
    /// and restores the previous state when released.
    pub fn activate(&self) -> GeneratorRun<'_> {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        GeneratorRun {
            context: self,
            was_active,
        }
    }
}

impl Drop for GeneratorContext {
    fn drop(&mut self) {
        // Detach from the shared context so its subscriber table does not
        // keep forwarding into a dead observer slot
        if let LayerSource::Shared {
            context,
            subscription,
        } = &*self.source.lock()
        {
            context.unsubscribe(*subscription);
        }
        self.fft_streams.clear();
    }
}

/// Scoped handle binding a context as the current one for a script run.
///
/// Dereferences to the context; dropping it restores the previous state.
pub struct GeneratorRun<'a> {
    context: &'a GeneratorContext,
    was_active: bool,
}

impl Deref for GeneratorRun<'_> {
    type Target = GeneratorContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl Drop for GeneratorRun<'_> {
    fn drop(&mut self) {
        self.context.active.store(self.was_active, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osbplay_editor_coordinator::ContributorId;
    use std::sync::atomic::AtomicUsize;

    fn test_paths() -> ProjectPaths {
        let dir = std::env::temp_dir();
        ProjectPaths {
            project_path: dir.clone(),
            asset_path: dir.clone(),
            mapset_path: dir,
        }
    }

    fn test_contributor(name: &str, priority: i32) -> Contributor {
        Contributor::new(ContributorId::new(), name, 0, priority)
    }

    #[test]
    fn test_local_layers_are_stable_references() {
        let context = GeneratorContext::new(test_contributor("bg", 0), test_paths());
        let first = context.get_layer(Some("bg")).unwrap();
        let second = context.get_layer(Some("bg")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_local_unnamed_is_distinct_slot() {
        let context = GeneratorContext::new(test_contributor("bg", 0), test_paths());
        let unnamed = context.get_layer(None).unwrap();
        let empty = context.get_layer(Some("")).unwrap();
        assert!(!Arc::ptr_eq(&unnamed, &empty));
        assert_eq!(unnamed.identifier(), &LayerIdentifier::Unnamed);
    }

    #[test]
    fn test_returned_layers_carry_the_contributor() {
        let contributor = test_contributor("particles", 7);
        let id = contributor.id;
        let context = GeneratorContext::new(contributor, test_paths());
        let layer = context.get_layer(Some("fg")).unwrap();
        let registered = layer.coordinator().contributor(id).unwrap();
        assert_eq!(registered.name, "particles");
        assert_eq!(registered.priority, 7);
    }

    #[test]
    fn test_shared_context_returns_shared_references() {
        let shared = Arc::new(StoryboardContext::new());
        let a = GeneratorContext::new(test_contributor("a", 0), test_paths());
        let b = GeneratorContext::new(test_contributor("b", 1), test_paths());
        a.set_shared_context(Some(shared.clone()));
        b.set_shared_context(Some(shared.clone()));

        let from_a = a.get_layer(Some("bg")).unwrap();
        let from_b = b.get_layer(Some("bg")).unwrap();
        assert!(Arc::ptr_eq(&from_a, &from_b));
        // both contributors ended up on the same coordinator
        assert_eq!(from_a.coordinator().contributor_count(), 2);
    }

    #[test]
    fn test_shared_creation_events_reach_all_bound_generators() {
        let shared = Arc::new(StoryboardContext::new());
        let a = GeneratorContext::new(test_contributor("a", 0), test_paths());
        let b = GeneratorContext::new(test_contributor("b", 1), test_paths());
        a.set_shared_context(Some(shared.clone()));
        b.set_shared_context(Some(shared.clone()));

        let seen_by_a = Arc::new(AtomicUsize::new(0));
        let seen_by_b = Arc::new(AtomicUsize::new(0));
        let counter = seen_by_a.clone();
        a.on_layer_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = seen_by_b.clone();
        b.on_layer_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        a.get_layer(Some("bg")).unwrap();
        assert_eq!(seen_by_a.load(Ordering::SeqCst), 1);
        assert_eq!(seen_by_b.load(Ordering::SeqCst), 1);

        // after detaching, b sees no further events while a continues to
        b.set_shared_context(None);
        a.get_layer(Some("fg")).unwrap();
        assert_eq!(seen_by_a.load(Ordering::SeqCst), 2);
        assert_eq!(seen_by_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rebinding_same_context_is_a_no_op() {
        let shared = Arc::new(StoryboardContext::new());
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths());
        context.set_shared_context(Some(shared.clone()));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        context.on_layer_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        context.set_shared_context(Some(shared.clone()));
        context.get_layer(Some("bg")).unwrap();
        // one subscription only; rebinding did not stack a second one
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accessed_layers_record_in_order() {
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths());
        context.get_layer(Some("bg")).unwrap();
        context.get_layer(Some("fg")).unwrap();
        context.get_layer(Some("bg")).unwrap();
        let accessed = context.accessed_layers();
        assert_eq!(accessed.len(), 2);
        assert_eq!(accessed[0].identifier(), &LayerIdentifier::named("bg"));
    }

    #[test]
    fn test_missing_mapset_raises_on_read() {
        let mut paths = test_paths();
        paths.mapset_path = PathBuf::from("/nonexistent/osbplay-mapset");
        let context = GeneratorContext::new(test_contributor("a", 0), paths);
        assert!(matches!(
            context.mapset_path(),
            Err(GeneratorError::MapsetMissing(_))
        ));
    }

    #[test]
    fn test_beatmap_reads_flip_the_dependence_flag() {
        let beatmap = Arc::new(Beatmap {
            name: "Insane".to_string(),
            audio_path: PathBuf::from("audio.mp3"),
        });
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths())
            .with_beatmaps(vec![beatmap.clone()]);
        assert!(!context.is_beatmap_dependent());
        assert_eq!(context.beatmap(), Some(beatmap));
        assert!(context.is_beatmap_dependent());
    }

    #[test]
    fn test_log_accumulates() {
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths());
        context.add_log("placing sprites");
        context.add_log("done");
        assert_eq!(context.log_text(), "placing sprites\ndone");
        context.clear_log();
        assert_eq!(context.log_text(), "");
    }

    #[test]
    fn test_activation_guard_restores_state() {
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths());
        assert!(!context.is_active());
        {
            let run = context.activate();
            assert!(run.is_active());
            // nested activation restores to the outer run's state
            drop(run.activate());
            assert!(context.is_active());
        }
        assert!(!context.is_active());
    }

    #[test]
    fn test_add_dependency_forwards_to_watcher() {
        let watcher = Arc::new(DependencyWatcher::new().unwrap());
        let context = GeneratorContext::new(test_contributor("a", 0), test_paths())
            .with_watcher(watcher.clone());
        let path = std::env::temp_dir().join("sb/particle.png");
        context.add_dependency(&path);
        assert!(watcher.is_watching(&path));
    }
}
