//! On-disk layout: raw downloads and processed cache entries
//!
//! ```text
//! <root>/<name>/raw/<source file>        fetched once, never updated
//! <root>/<name>/processed/<partition>.pt  written once, read wholesale
//! ```
//!
//! Existence is the only state tracked. A truncated entry is not detected
//! here; it fails later when [`codec::load_entry`] decodes it.
//!
//! Single-writer: populating one root from two processes at once is not
//! supported. Entries are written to a temporary sibling and renamed into
//! place, so readers never observe a half-written file.

pub mod codec;

use std::path::{Path, PathBuf};

use crate::manifest::DatasetManifest;
use crate::partition::Partition;

/// Resolved directories for one dataset under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
    dataset_dir: PathBuf,
}

impl CacheLayout {
    /// Layout for `manifest` under `root` (a leading `~` expands to `$HOME`).
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P, manifest: &DatasetManifest) -> Self {
        let root = expand_home(root.as_ref());
        let dataset_dir = root.join(&manifest.name);
        Self { root, dataset_dir }
    }

    /// Root directory as given (after `~` expansion)
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>`
    #[must_use]
    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// Raw download directory
    #[must_use]
    pub fn raw(&self) -> RawStore {
        RawStore::new(self.dataset_dir.join("raw"))
    }

    /// Processed cache directory
    #[must_use]
    pub fn processed(&self) -> ProcessedCache {
        ProcessedCache::new(self.dataset_dir.join("processed"))
    }
}

/// Directory of fetched raw files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStore {
    dir: PathBuf,
}

impl RawStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory path
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of `filename` inside the store
    #[must_use]
    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Whether `filename` has been fetched
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.path(filename).exists()
    }

    /// Create the directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

/// Directory of processed partition entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedCache {
    dir: PathBuf,
}

impl ProcessedCache {
    /// Cache rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory path
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Expected path of `partition`'s entry
    #[must_use]
    pub fn entry_path(&self, partition: Partition) -> PathBuf {
        self.dir.join(partition.file_name())
    }

    /// True iff every partition entry is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        Partition::ALL
            .iter()
            .all(|&partition| self.entry_path(partition).exists())
    }

    /// Partitions whose entry is absent
    #[must_use]
    pub fn missing(&self) -> Vec<Partition> {
        Partition::ALL
            .into_iter()
            .filter(|&partition| !self.entry_path(partition).exists())
            .collect()
    }

    /// Create the directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
