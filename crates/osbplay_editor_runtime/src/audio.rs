// SPDX-License-Identifier: MIT OR Apache-2.0
//! FFT audio sources for generator runs.
//!
//! The editor injects the concrete decoder; the runtime only caches opened
//! streams per absolute path. Each cache belongs to exactly one generator
//! context and its entries are released when the context drops.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened audio stream supporting FFT queries
pub trait FftSource: Send + Sync {
    /// Stream duration in milliseconds
    fn duration(&self) -> f64;

    /// Sample frequency in Hz
    fn frequency(&self) -> f64;

    /// Magnitude spectrum around `time`; with `split_channels` the
    /// channels are returned back to back instead of mixed down
    fn get_fft(&self, time: f64, split_channels: bool) -> Vec<f32>;
}

/// Opens an [`FftSource`] from an absolute file path
pub type FftSourceFactory = Arc<dyn Fn(&Path) -> anyhow::Result<Box<dyn FftSource>> + Send + Sync>;

/// Cache of opened FFT streams, keyed by absolute path
pub struct FftStreamCache {
    factory: FftSourceFactory,
    streams: Mutex<HashMap<PathBuf, Arc<dyn FftSource>>>,
}

impl FftStreamCache {
    /// Create an empty cache backed by a source factory
    pub fn new(factory: FftSourceFactory) -> Self {
        Self {
            factory,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// A cache whose factory refuses every path
    pub fn disabled() -> Self {
        Self::new(Arc::new(|path| {
            anyhow::bail!("no FFT source factory configured (requested {})", path.display())
        }))
    }

    /// The stream for a path, opened on first use
    pub fn get(&self, path: &Path) -> anyhow::Result<Arc<dyn FftSource>> {
        let key = absolute(path);
        let mut streams = self.streams.lock();
        if let Some(stream) = streams.get(&key) {
            return Ok(stream.clone());
        }
        let stream: Arc<dyn FftSource> = Arc::from((self.factory)(&key)?);
        streams.insert(key, stream.clone());
        Ok(stream)
    }

    /// Number of opened streams
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    /// Whether no stream has been opened
    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Release every opened stream
    pub fn clear(&self) {
        self.streams.lock().clear();
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource;

    impl FftSource for StubSource {
        fn duration(&self) -> f64 {
            120_000.0
        }

        fn frequency(&self) -> f64 {
            44_100.0
        }

        fn get_fft(&self, _time: f64, split_channels: bool) -> Vec<f32> {
            vec![0.0; if split_channels { 2048 } else { 1024 }]
        }
    }

    fn counting_factory(opened: Arc<AtomicUsize>) -> FftSourceFactory {
        Arc::new(move |_path| {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSource) as Box<dyn FftSource>)
        })
    }

    #[test]
    fn test_streams_open_once_per_path() {
        let opened = Arc::new(AtomicUsize::new(0));
        let cache = FftStreamCache::new(counting_factory(opened.clone()));

        let first = cache.get(Path::new("audio.mp3")).unwrap();
        let second = cache.get(Path::new("audio.mp3")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        cache.get(Path::new("hitsound.wav")).unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_releases_entries() {
        let opened = Arc::new(AtomicUsize::new(0));
        let cache = FftStreamCache::new(counting_factory(opened.clone()));
        cache.get(Path::new("audio.mp3")).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.get(Path::new("audio.mp3")).unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_cache_errors() {
        let cache = FftStreamCache::disabled();
        assert!(cache.get(Path::new("audio.mp3")).is_err());
    }
}
