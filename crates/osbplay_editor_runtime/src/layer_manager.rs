// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered list of editor-visible layers.

use crate::layer::Layer;
use std::sync::Arc;

/// Maintains the ordered list of layers the editor shows.
///
/// Owned by the editor; re-runs swap layer sets through the two replace
/// forms, reusing shared references so held handles stay valid.
#[derive(Default)]
pub struct LayerManager {
    layers: Vec<Arc<Layer>>,
}

impl LayerManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// The visible layers, in draw order
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    /// Number of visible layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer is visible
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Append a layer
    pub fn add(&mut self, layer: Arc<Layer>) {
        self.layers.push(layer);
    }

    /// Remove a layer by reference; returns whether it was present
    pub fn remove(&mut self, layer: &Arc<Layer>) -> bool {
        let before = self.layers.len();
        self.layers.retain(|known| !Arc::ptr_eq(known, layer));
        self.layers.len() != before
    }

    /// Replace one placeholder layer with a list, inlining it in place.
    ///
    /// Returns whether the placeholder was found.
    pub fn replace_layer(&mut self, placeholder: &Arc<Layer>, replacements: Vec<Arc<Layer>>) -> bool {
        let Some(index) = self
            .layers
            .iter()
            .position(|known| Arc::ptr_eq(known, placeholder))
        else {
            return false;
        };
        self.layers.splice(index..=index, replacements);
        true
    }

    /// Replace a set of layers with a new list.
    ///
    /// New layers are matched to old ones by identifier and the shared
    /// reference is reused in place; ordering follows the new list, and old
    /// layers the new list does not reference are dropped.
    pub fn replace_layers(&mut self, previous: &[Arc<Layer>], replacements: Vec<Arc<Layer>>) {
        let is_previous =
            |layer: &Arc<Layer>| previous.iter().any(|known| Arc::ptr_eq(known, layer));

        let insert_at = self
            .layers
            .iter()
            .position(is_previous)
            .unwrap_or(self.layers.len());

        let removed: Vec<Arc<Layer>> = self
            .layers
            .iter()
            .filter(|layer| is_previous(layer))
            .cloned()
            .collect();
        self.layers.retain(|layer| !is_previous(layer));

        let mapped = replacements.into_iter().map(|new| {
            removed
                .iter()
                .find(|old| old.identifier() == new.identifier())
                .cloned()
                .unwrap_or(new)
        });
        self.layers.splice(insert_at..insert_at, mapped);
    }
}
