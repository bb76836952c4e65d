//! Cache population: fetch raw files, convert, persist partitions
//!
//! Idempotent at whole-cache granularity: a complete processed cache makes
//! [`populate_cache`] a no-op. An incomplete one triggers a full rebuild; the
//! fetcher's own existence check keeps already-downloaded raw files from being
//! transferred again.

use tracing::{debug, info};

use crate::fetch::Fetcher;
use crate::manifest::DatasetManifest;
use crate::sample::PartitionBuilder;
use crate::storage::CacheLayout;
use crate::Result;

/// Make sure every processed entry for `manifest` exists under `layout`.
///
/// # Errors
/// The first fetch, conversion or write failure aborts the whole population.
/// Raw files fetched before the failure stay in place.
pub fn populate_cache<F: Fetcher + ?Sized>(
    layout: &CacheLayout,
    manifest: &DatasetManifest,
    fetcher: &F,
) -> Result<()> {
    let cache = layout.processed();
    if cache.exists() {
        debug!(path = %cache.dir().display(), "processed cache complete, nothing to do");
        return Ok(());
    }

    manifest.validate()?;
    info!(
        dataset = %manifest.name,
        missing = ?cache.missing(),
        "populating processed cache"
    );

    let raw = layout.raw();
    raw.ensure_dir()?;
    cache.ensure_dir()?;

    for source in &manifest.sources {
        fetcher.fetch(&source.url, &raw.path(&source.raw_filename))?;
    }

    PartitionBuilder::build_all(manifest, &raw, &cache)
}
