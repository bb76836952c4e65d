//! Indexed access to one processed partition
//!
//! Opening a dataset optionally populates the cache, then loads exactly one
//! partition into memory. Reads are side-effect free apart from whatever the
//! user transforms do; the loaded tensors are never mutated.
//!
//! ```rust,no_run
//! use snist::{NoiseLevel, SnistOptions};
//!
//! # fn example() -> snist::Result<()> {
//! let test = SnistOptions::new("~/datasets")
//!     .train(false)
//!     .noise(NoiseLevel::Level1)
//!     .download(true)
//!     .transform(|x: ndarray::ArrayD<f32>| x / 255.0)
//!     .open()?;
//!
//! let (amplitudes, velocities) = test.get(0)?;
//! assert_eq!(amplitudes.shape()[0], 1);
//! # let _ = velocities;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use tracing::{info, warn};

use crate::fetch::Fetcher;
use crate::manifest::DatasetManifest;
use crate::partition::{NoiseLevel, Partition};
use crate::pipeline::populate_cache;
use crate::sample::Sample;
use crate::storage::codec::{self, EntryHeader};
use crate::storage::CacheLayout;
use crate::transform::Transform;
use crate::{Error, Result};

/// Random-access source of `(item, label)` pairs for a training loop.
pub trait Dataset {
    /// Feature type
    type Item;
    /// Target type
    type Label;

    /// Number of samples
    fn len(&self) -> usize;

    /// True when there are no samples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index`.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] when `index >= len()`
    fn get(&self, index: usize) -> Result<(Self::Item, Self::Label)>;
}

/// Configuration for opening a [`Snist`] dataset.
pub struct SnistOptions {
    root: PathBuf,
    train: bool,
    noise: NoiseLevel,
    download: bool,
    manifest: DatasetManifest,
    fetcher: Option<Box<dyn Fetcher>>,
    transform: Option<Box<dyn Transform>>,
    target_transform: Option<Box<dyn Transform>>,
}

impl SnistOptions {
    /// Defaults: training split, clean noise level, no download, SNIST manifest.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            train: true,
            noise: NoiseLevel::Clean,
            download: false,
            manifest: DatasetManifest::snist(),
            fetcher: None,
            transform: None,
            target_transform: None,
        }
    }

    /// Select the training (`true`) or test (`false`) split
    #[must_use]
    pub const fn train(mut self, train: bool) -> Self {
        self.train = train;
        self
    }

    /// Noise level of the test split (ignored for training)
    #[must_use]
    pub const fn noise(mut self, noise: NoiseLevel) -> Self {
        self.noise = noise;
        self
    }

    /// Populate the cache when it is incomplete
    #[must_use]
    pub const fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Use an alternate manifest
    #[must_use]
    pub fn manifest(mut self, manifest: DatasetManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Fetcher used when downloading (defaults to [`crate::fetch::HttpFetcher`])
    #[must_use]
    pub fn fetcher<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Transform applied to each feature on read
    #[must_use]
    pub fn transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Transform applied to each target on read
    #[must_use]
    pub fn target_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.target_transform = Some(Box::new(transform));
        self
    }

    /// Populate (if requested), check the cache and load the selected partition.
    ///
    /// # Errors
    /// - [`Error::CacheMissing`] if the cache is incomplete and download is off
    /// - any population error when download is on
    /// - [`Error::Deserialization`] if the selected entry cannot be decoded
    pub fn open(self) -> Result<Snist> {
        let layout = CacheLayout::new(&self.root, &self.manifest);
        let cache = layout.processed();

        if self.download && !cache.exists() {
            match &self.fetcher {
                Some(fetcher) => populate_cache(&layout, &self.manifest, fetcher.as_ref())?,
                None => populate_with_default_fetcher(&layout, &self.manifest)?,
            }
        }

        if !cache.exists() {
            warn!(path = %cache.dir().display(), missing = ?cache.missing(), "dataset not found");
            return Err(Error::CacheMissing {
                root: layout.dataset_dir().to_path_buf(),
            });
        }

        let partition = Partition::select(self.train, self.noise);
        let path = cache.entry_path(partition);
        let (header, sample) = codec::load_entry(&path)?;
        if header.partition != partition {
            return Err(Error::deserialization(
                &path,
                format!("entry holds partition {} instead of {partition}", header.partition),
            ));
        }
        info!(%partition, samples = sample.len(), "loaded partition");

        Ok(Snist {
            name: self.manifest.name,
            root: layout.root().to_path_buf(),
            partition,
            header,
            sample,
            transform: self.transform,
            target_transform: self.target_transform,
        })
    }
}

#[cfg(feature = "http")]
fn populate_with_default_fetcher(layout: &CacheLayout, manifest: &DatasetManifest) -> Result<()> {
    let fetcher = crate::fetch::HttpFetcher::new()?;
    populate_cache(layout, manifest, &fetcher)
}

#[cfg(not(feature = "http"))]
fn populate_with_default_fetcher(_layout: &CacheLayout, _manifest: &DatasetManifest) -> Result<()> {
    Err(Error::NoFetcher)
}

/// One loaded SNIST partition.
pub struct Snist {
    name: String,
    root: PathBuf,
    partition: Partition,
    header: EntryHeader,
    sample: Sample,
    transform: Option<Box<dyn Transform>>,
    target_transform: Option<Box<dyn Transform>>,
}

impl Snist {
    /// Open with the default manifest and no transforms.
    ///
    /// # Errors
    /// See [`SnistOptions::open`]
    pub fn new(root: impl Into<PathBuf>, train: bool, noise: NoiseLevel, download: bool) -> Result<Self> {
        SnistOptions::new(root)
            .train(train)
            .noise(noise)
            .download(download)
            .open()
    }

    /// Number of samples in the loaded partition
    #[must_use]
    pub fn len(&self) -> usize {
        self.sample.len()
    }

    /// True when the partition holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample.is_empty()
    }

    /// Feature and target at `index`, each passed through its transform.
    ///
    /// Features are `[1, H, W]`; targets have the velocity file's per-sample shape.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] when `index >= len()`
    pub fn get(&self, index: usize) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
        let (feature, target) = self.sample.row(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.len(),
        })?;

        let mut item = feature.to_owned();
        if let Some(transform) = &self.transform {
            item = transform.apply(item);
        }

        let mut label = target.to_owned();
        if let Some(transform) = &self.target_transform {
            label = transform.apply(label);
        }

        Ok((item, label))
    }

    /// Every sample in order
    pub fn iter(&self) -> impl Iterator<Item = Result<(ArrayD<f32>, ArrayD<f32>)>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    /// Loaded partition
    #[must_use]
    pub const fn partition(&self) -> Partition {
        self.partition
    }

    /// Whether this is the training split
    #[must_use]
    pub const fn is_train(&self) -> bool {
        self.partition.is_train()
    }

    /// Root directory the dataset was opened under
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Header of the loaded cache entry
    #[must_use]
    pub const fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Untransformed feature tensor `[N, 1, H, W]`
    #[must_use]
    pub const fn features(&self) -> &ArrayD<f32> {
        self.sample.features()
    }

    /// Untransformed target tensor
    #[must_use]
    pub const fn targets(&self) -> &ArrayD<f32> {
        self.sample.targets()
    }
}

impl Dataset for Snist {
    type Item = ArrayD<f32>;
    type Label = ArrayD<f32>;

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn get(&self, index: usize) -> Result<(Self::Item, Self::Label)> {
        Self::get(self, index)
    }
}

impl fmt::Display for Snist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |t: &Option<Box<dyn Transform>>| if t.is_some() { "set" } else { "None" };

        writeln!(f, "Dataset {}", self.name)?;
        writeln!(f, "    Number of datapoints: {}", self.len())?;
        writeln!(f, "    Split: {}", if self.is_train() { "train" } else { "test" })?;
        if !self.is_train() {
            writeln!(f, "    Partition: {}", self.partition)?;
        }
        writeln!(f, "    Root Location: {}", self.root.display())?;
        writeln!(f, "    Transforms (if any): {}", set(&self.transform))?;
        write!(f, "    Target Transforms (if any): {}", set(&self.target_transform))
    }
}

impl fmt::Debug for Snist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snist")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("partition", &self.partition)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
