//! Crate-wide error type
//!
//! Load-time and setup-time errors are fatal: they surface before any
//! optimization step runs, so a run never proceeds with a partially-loaded
//! model or mismatched data sources. Errors raised inside a training step
//! propagate and terminate the run; there is no per-batch retry.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the training and loading core
#[derive(Debug, Error)]
pub enum Error {
    /// A checkpoint key matched none of the renaming rules. Unrecognized
    /// keys are never dropped; loading fails instead.
    #[error("unknown parameter key: {0}")]
    UnknownParameterKey(String),

    /// The checkpoint identifier names a variant outside the known set.
    #[error("unsupported model variant: {0}")]
    UnsupportedModelVariant(String),

    /// The checkpoint identifier names a known variant that is deferred
    /// (a limitation, not a bug). Distinct from [`Error::UnsupportedModelVariant`]
    /// so callers can tell "unknown" from "known but unavailable".
    #[error("model variant not implemented: {0}")]
    NotImplementedVariant(String),

    /// Train and test data sources disagree on grid dimensions, or a batch
    /// does not carry the labels the active task mode requires.
    #[error("data shape mismatch: {0}")]
    DataShapeMismatch(String),

    /// A checkpoint could not be written. Fatal; progress up to the last
    /// successful checkpoint remains on disk.
    #[error("failed to write checkpoint {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization or deserialization of model/optimizer state failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
