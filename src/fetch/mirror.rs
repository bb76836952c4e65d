//! Fetcher backed by a local directory.
//!
//! Useful for offline machines and for tests: the mirror holds files under the
//! same names as the URLs' final path segments.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{place_atomically, Fetcher};
use crate::manifest::filename_from_url;
use crate::{Error, Result};

/// Copies raw files out of a local mirror directory.
#[derive(Debug, Clone)]
pub struct MirrorFetcher {
    source_dir: PathBuf,
}

impl MirrorFetcher {
    /// Mirror rooted at `source_dir`
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// Mirror directory
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

impl Fetcher for MirrorFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        if destination.exists() {
            debug!(url, path = %destination.display(), "already present, skipping");
            return Ok(());
        }

        let source = self.source_dir.join(filename_from_url(url));
        let bytes = std::fs::read(&source)
            .map_err(|e| Error::fetch(url, format!("{}: {e}", source.display())))?;
        place_atomically(url, destination, &bytes)?;

        debug!(url, path = %destination.display(), bytes = bytes.len(), "copied from mirror");
        Ok(())
    }
}
