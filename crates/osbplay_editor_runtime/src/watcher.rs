// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency watcher for generator runs.
//!
//! Generators declare the files their output depends on; the editor polls
//! for changes to re-run the affected effects. The watcher is shared by
//! reference and only ever appended to.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Watches the dependency paths generator runs declare.
///
/// `watch` is total and watch-only: paths are recorded even when the
/// filesystem watch cannot be registered, and nothing is ever unwatched.
pub struct DependencyWatcher {
    debouncer: Mutex<Debouncer<RecommendedWatcher, FileIdMap>>,
    watched: Arc<RwLock<HashSet<PathBuf>>>,
    event_rx: Mutex<Receiver<PathBuf>>,
}

impl DependencyWatcher {
    /// Create a watcher with the default debounce window
    pub fn new() -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let watched = Arc::new(RwLock::new(HashSet::<PathBuf>::new()));
        let filter = watched.clone();

        let debouncer = new_debouncer(
            Duration::from_millis(250),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        for path in &event.paths {
                            if filter.read().contains(path) {
                                let _ = event_tx.send(path.clone());
                            }
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(%error, "dependency watcher error");
                    }
                }
            },
        )?;

        Ok(Self {
            debouncer: Mutex::new(debouncer),
            watched,
            event_rx: Mutex::new(event_rx),
        })
    }

    /// Record a dependency path and register it with the filesystem watch
    pub fn watch(&self, path: &Path) {
        let path = path.to_path_buf();
        if !self.watched.write().insert(path.clone()) {
            return;
        }
        if let Err(error) = self
            .debouncer
            .lock()
            .watcher()
            .watch(&path, RecursiveMode::NonRecursive)
        {
            // The path stays in the set; a dependency on a file that does
            // not exist yet is still a dependency.
            tracing::debug!(%error, path = %path.display(), "could not register filesystem watch");
        } else {
            tracing::debug!(path = %path.display(), "watching dependency");
        }
    }

    /// Whether a path has been recorded
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.read().contains(path)
    }

    /// Every recorded dependency path
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched.read().iter().cloned().collect()
    }

    /// Number of recorded dependency paths
    pub fn watch_count(&self) -> usize {
        self.watched.read().len()
    }

    /// Drain pending change notifications (non-blocking)
    pub fn poll_changes(&self) -> Vec<PathBuf> {
        let mut changes = Vec::new();
        let event_rx = self.event_rx.lock();
        loop {
            match event_rx.try_recv() {
                Ok(path) => changes.push(path),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("dependency watcher channel disconnected");
                    break;
                }
            }
        }
        changes
    }
}
