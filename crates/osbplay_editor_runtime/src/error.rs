// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the editor runtime.

use crate::layer::LayerIdentifier;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a shared storyboard context
#[derive(Debug, Error)]
pub enum ContextError {
    /// A layer had to be created but no factory has been attached
    #[error("no layer factory attached to the shared storyboard context")]
    LayerFactoryAbsent,

    /// The attached factory returned no layer; a programming error, fatal
    /// for the call
    #[error("layer factory returned no layer for {identifier}")]
    LayerFactoryReturnedNull {
        /// The identifier the factory was asked for
        identifier: LayerIdentifier,
    },
}

/// Errors raised by a generator context
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The mapset path no longer exists; raised on read
    #[error("mapset path no longer exists: {0}")]
    MapsetMissing(PathBuf),

    /// Shared-context failure
    #[error(transparent)]
    Context(#[from] ContextError),

    /// An FFT audio stream could not be opened
    #[error("audio stream error for {path}: {source}")]
    AudioStream {
        /// The requested audio path
        path: PathBuf,
        /// The underlying factory error
        source: anyhow::Error,
    },
}
