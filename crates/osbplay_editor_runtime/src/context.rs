// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared storyboard contexts.
//!
//! A [`StoryboardContext`] gives multiple generator runs the same layer
//! references for the same identifiers, with creation events and snapshot
//! semantics. Contexts are grouped per shared-context key through the
//! [`SharedContextPool`].

use crate::error::ContextError;
use crate::layer::{Layer, LayerIdentifier};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the layer for an identifier on first use.
///
/// Returning `None` is a programming error surfaced as
/// [`ContextError::LayerFactoryReturnedNull`].
pub type LayerFactory = Arc<dyn Fn(&LayerIdentifier) -> Option<Arc<Layer>> + Send + Sync>;

/// Callback observing newly created layers
pub type LayerCreatedCallback = Arc<dyn Fn(&Arc<Layer>) + Send + Sync>;

/// Handle to a layer-created subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Default)]
struct ContextState {
    named: IndexMap<String, Arc<Layer>>,
    unnamed: Option<Arc<Layer>>,
    version: u64,
    factory: Option<LayerFactory>,
    subscribers: IndexMap<SubscriptionId, LayerCreatedCallback>,
}

impl ContextState {
    fn lookup(&self, identifier: &LayerIdentifier) -> Option<Arc<Layer>> {
        match identifier {
            LayerIdentifier::Unnamed => self.unnamed.clone(),
            LayerIdentifier::Named(name) => self.named.get(name).cloned(),
        }
    }

    fn insert(&mut self, identifier: &LayerIdentifier, layer: Arc<Layer>) {
        match identifier {
            LayerIdentifier::Unnamed => self.unnamed = Some(layer),
            LayerIdentifier::Named(name) => {
                self.named.insert(name.clone(), layer);
            }
        }
    }

    fn all_layers(&self) -> Vec<Arc<Layer>> {
        let mut layers: Vec<Arc<Layer>> = self.named.values().cloned().collect();
        layers.extend(self.unnamed.clone());
        layers
    }
}

/// Registry mapping layer identifiers to shared layer references.
///
/// The same identifier resolves to the same layer for the context's whole
/// lifetime, or until [`reset`](Self::reset). One coarse mutex guards the
/// registry; creation events always fire outside it.
#[derive(Default)]
pub struct StoryboardContext {
    state: Mutex<ContextState>,
}

impl StoryboardContext {
    /// Create an empty context with no layer factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the layer factory. First wins: once attached, later
    /// attachments are ignored so every generator sees the same layer kind.
    /// Returns whether this call attached.
    pub fn attach_layer_factory(&self, factory: LayerFactory) -> bool {
        let mut state = self.state.lock();
        if state.factory.is_some() {
            return false;
        }
        state.factory = Some(factory);
        true
    }

    /// Look up or create the layer for an identifier.
    ///
    /// A factory passed here takes precedence over the attached one for
    /// this call only. The `LayerCreated` event fires exactly once per new
    /// layer, after the context lock is released.
    pub fn get_layer_with(
        &self,
        identifier: &LayerIdentifier,
        factory: Option<&LayerFactory>,
    ) -> Result<Arc<Layer>, ContextError> {
        let (layer, listeners) = {
            let mut state = self.state.lock();
            if let Some(existing) = state.lookup(identifier) {
                return Ok(existing);
            }

            let factory = factory
                .cloned()
                .or_else(|| state.factory.clone())
                .ok_or(ContextError::LayerFactoryAbsent)?;
            let layer = factory(identifier).ok_or_else(|| ContextError::LayerFactoryReturnedNull {
                identifier: identifier.clone(),
            })?;

            state.insert(identifier, layer.clone());
            state.version += 1;
            let listeners: Vec<LayerCreatedCallback> = state.subscribers.values().cloned().collect();
            (layer, listeners)
        };

        tracing::debug!(layer = %layer.identifier(), "created shared layer");
        for listener in &listeners {
            listener(&layer);
        }
        Ok(layer)
    }

    /// Look up or create through the attached factory
    pub fn get_layer(&self, identifier: &LayerIdentifier) -> Result<Arc<Layer>, ContextError> {
        self.get_layer_with(identifier, None)
    }

    /// Non-creating lookup; the unnamed slot is supported
    pub fn try_get_layer(&self, identifier: &LayerIdentifier) -> Option<Arc<Layer>> {
        self.state.lock().lookup(identifier)
    }

    /// Point-in-time copy of the layer set; later mutations do not
    /// propagate into the returned list
    pub fn snapshot_layers(&self) -> Vec<Arc<Layer>> {
        self.state.lock().all_layers()
    }

    /// Visit every layer.
    ///
    /// With `snapshot` the visit runs over a point-in-time copy; without it
    /// the context lock is held, so the callback must finish promptly.
    pub fn for_each_layer(&self, snapshot: bool, mut f: impl FnMut(&Arc<Layer>)) {
        if snapshot {
            for layer in self.snapshot_layers() {
                f(&layer);
            }
        } else {
            let state = self.state.lock();
            for layer in state.named.values() {
                f(layer);
            }
            if let Some(layer) = &state.unnamed {
                f(layer);
            }
        }
    }

    /// Drop every layer, including the unnamed slot, and bump the version.
    /// The factory and subscriptions survive.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.named.clear();
        state.unnamed = None;
        state.version += 1;
        tracing::debug!(version = state.version, "reset shared storyboard context");
    }

    /// Monotonic stamp, bumped on each creation and reset
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Number of layers, the unnamed slot included
    pub fn layer_count(&self) -> usize {
        let state = self.state.lock();
        state.named.len() + usize::from(state.unnamed.is_some())
    }

    /// Subscribe to `LayerCreated` events
    pub fn subscribe(&self, callback: LayerCreatedCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.state.lock().subscribers.insert(id, callback);
        id
    }

    /// Drop a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscribers.shift_remove(&id).is_some()
    }
}

/// Shared contexts grouped by shared-context key.
///
/// Scripts carrying the same key observe the same [`StoryboardContext`].
#[derive(Default)]
pub struct SharedContextPool {
    contexts: Mutex<IndexMap<String, Arc<StoryboardContext>>>,
}

impl SharedContextPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// The context for a key, created on first use
    pub fn for_key(&self, key: &str) -> Arc<StoryboardContext> {
        self.contexts
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(StoryboardContext::new()))
            .clone()
    }

    /// Number of distinct contexts
    pub fn len(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.contexts.lock().is_empty()
    }
}

/// A factory producing plain [`Layer`]s
pub fn default_layer_factory() -> LayerFactory {
    Arc::new(|identifier: &LayerIdentifier| Some(Arc::new(Layer::new(identifier.clone()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_factory_absent_is_an_error() {
        let context = StoryboardContext::new();
        let result = context.get_layer(&LayerIdentifier::named("bg"));
        assert!(matches!(result, Err(ContextError::LayerFactoryAbsent)));
    }

    #[test]
    fn test_factory_returning_none_is_fatal_for_the_call() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(Arc::new(|_| None));
        let result = context.get_layer(&LayerIdentifier::named("bg"));
        assert!(matches!(
            result,
            Err(ContextError::LayerFactoryReturnedNull { .. })
        ));
        assert_eq!(context.layer_count(), 0);
    }

    #[test]
    fn test_attach_factory_first_wins() {
        let context = StoryboardContext::new();
        assert!(context.attach_layer_factory(default_layer_factory()));
        assert!(!context.attach_layer_factory(Arc::new(|_| None)));
        // the first factory is still in effect
        assert!(context.get_layer(&LayerIdentifier::named("bg")).is_ok());
    }

    #[test]
    fn test_same_identifier_same_reference() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());
        let first = context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        let second = context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(context.layer_count(), 1);
    }

    #[test]
    fn test_unnamed_slot_is_singular_and_resettable() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());

        let first = context.get_layer(&LayerIdentifier::Unnamed).unwrap();
        let second = context.get_layer(&LayerIdentifier::Unnamed).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(context.layer_count(), 1);

        let version = context.version();
        context.reset();
        assert!(context.try_get_layer(&LayerIdentifier::Unnamed).is_none());
        assert_eq!(context.layer_count(), 0);
        assert!(context.version() > version);
    }

    #[test]
    fn test_unnamed_distinct_from_empty_name() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());
        let unnamed = context.get_layer(&LayerIdentifier::Unnamed).unwrap();
        let empty = context.get_layer(&LayerIdentifier::named("")).unwrap();
        assert!(!Arc::ptr_eq(&unnamed, &empty));
        assert_eq!(context.layer_count(), 2);
    }

    #[test]
    fn test_layer_created_fires_once_per_creation() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        context.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        context.get_layer(&LayerIdentifier::named("fg")).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribed_observer_sees_no_further_events() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let subscription = context.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        assert!(context.unsubscribe(subscription));
        context.get_layer(&LayerIdentifier::named("fg")).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_fire_outside_the_lock() {
        // A listener that re-enters the context must not deadlock
        let context = Arc::new(StoryboardContext::new());
        context.attach_layer_factory(default_layer_factory());
        let reentrant = context.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = observed.clone();
        context.subscribe(Arc::new(move |layer| {
            if reentrant.try_get_layer(layer.identifier()).is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        context.get_layer(&LayerIdentifier::named("bg")).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_does_not_observe_later_mutations() {
        let context = StoryboardContext::new();
        context.attach_layer_factory(default_layer_factory());
        context.get_layer(&LayerIdentifier::named("bg")).unwrap();

        let snapshot = context.snapshot_layers();
        context.get_layer(&LayerIdentifier::named("fg")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(context.snapshot_layers().len(), 2);
    }

    #[test]
    fn test_pool_groups_by_key() {
        let pool = SharedContextPool::new();
        let a = pool.for_key("scripts.Background");
        let b = pool.for_key("scripts.Background");
        let c = pool.for_key("scripts.Particles");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }
}
