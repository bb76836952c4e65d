//! Error types for the SNIST cache
//!
//! Every failure is terminal for the operation in progress; nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SNIST error types
#[derive(Error, Debug)]
pub enum Error {
    /// Processed cache is absent and download was not requested
    #[error("Dataset not found under {}\nYou can enable download to fetch it", root.display())]
    CacheMissing {
        /// Dataset directory that was inspected
        root: PathBuf,
    },

    /// Raw file transfer failed
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed {
        /// Source URL
        url: String,
        /// Underlying transfer error
        reason: String,
    },

    /// Raw array does not have the expected layout
    #[error("Format error in {}: {reason}", path.display())]
    FormatError {
        /// Offending raw file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Indexed read past the end of the partition
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of samples in the partition
        len: usize,
    },

    /// Cache entry exists but cannot be decoded
    #[error("Failed to deserialize cache entry {}: {reason}", path.display())]
    Deserialization {
        /// Cache entry path
        path: PathBuf,
        /// Decoder error
        reason: String,
    },

    /// Noise level outside {0, 1, 2}
    #[error("Invalid noise level: {0} (expected 0, 1 or 2)")]
    InvalidNoise(i64),

    /// Manifest failed validation
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Features and targets disagree on the sample count
    #[error("Shape mismatch: {features} feature rows vs {targets} target rows")]
    ShapeMismatch {
        /// Leading dimension of the feature tensor
        features: usize,
        /// Leading dimension of the target tensor
        targets: usize,
    },

    /// Download requested without any fetcher available
    #[error("No fetcher configured\nBuild with the `http` feature or supply one via SnistOptions::fetcher")]
    NoFetcher,

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON error (manifest or entry metadata)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a format error for `path`.
    #[must_use]
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FormatError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a fetch error for `url`.
    #[must_use]
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a deserialization error for the cache entry at `path`.
    #[must_use]
    pub fn deserialization(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Deserialization {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
