//! Raw file transfer
//!
//! The pipeline only decides *whether* to fetch and *where* a file goes; the
//! transfer itself is behind [`Fetcher`]. Implementations skip files that are
//! already present, which is what makes a retried population cheap.
//!
//! # Example
//!
//! ```rust,no_run
//! use snist::fetch::{Fetcher, MirrorFetcher};
//! use std::path::Path;
//!
//! # fn example() -> snist::Result<()> {
//! let fetcher = MirrorFetcher::new("/mnt/mirror/snist");
//! fetcher.fetch(
//!     "https://example.org/data/train_amplitudes.npy",
//!     Path::new("/tmp/SNIST/raw/train_amplitudes.npy"),
//! )?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
mod http;
mod mirror;

#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use mirror::MirrorFetcher;

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Deposits the file behind a URL at a destination path.
pub trait Fetcher {
    /// Make `destination` hold the content of `url`.
    ///
    /// No-op if `destination` already exists.
    ///
    /// # Errors
    /// Returns [`crate::Error::FetchFailed`] if the transfer fails or the
    /// destination cannot be written
    fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        (**self).fetch(url, destination)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        (**self).fetch(url, destination)
    }
}

/// Write the content of `url` to `destination` through a `.part` sibling.
///
/// A failed write is reported against `url` and leaves nothing at either path.
pub(crate) fn place_atomically(url: &str, destination: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(destination);
    if let Err(e) = fs::write(&partial, bytes).and_then(|()| fs::rename(&partial, destination)) {
        let _ = fs::remove_file(&partial);
        return Err(Error::fetch(url, format!("cannot write {}: {e}", destination.display())));
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
