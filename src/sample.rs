//! Samples and the partition builder

use std::path::Path;

use ndarray::{ArrayD, ArrayViewD, Axis};
use tracing::{debug, info};

use crate::convert::{convert_amplitude, convert_velocity};
use crate::manifest::DatasetManifest;
use crate::partition::Partition;
use crate::storage::{codec, ProcessedCache, RawStore};
use crate::{Error, Result};

/// Features and targets of one partition.
///
/// Features are `[N, 1, H, W]`; targets keep the velocity file's shape `[N, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    features: ArrayD<f32>,
    targets: ArrayD<f32>,
}

impl Sample {
    /// Pair features with targets.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the leading dimensions differ, or a
    /// storage error if either tensor is 0-D
    pub fn new(features: ArrayD<f32>, targets: ArrayD<f32>) -> Result<Self> {
        if features.ndim() == 0 || targets.ndim() == 0 {
            return Err(Error::StorageError(
                "features and targets need a leading sample dimension".to_string(),
            ));
        }
        let (n_features, n_targets) = (features.len_of(Axis(0)), targets.len_of(Axis(0)));
        if n_features != n_targets {
            return Err(Error::ShapeMismatch {
                features: n_features,
                targets: n_targets,
            });
        }
        Ok(Self { features, targets })
    }

    /// Number of samples (N)
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len_of(Axis(0))
    }

    /// True when the partition holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full feature tensor
    #[must_use]
    pub const fn features(&self) -> &ArrayD<f32> {
        &self.features
    }

    /// Full target tensor
    #[must_use]
    pub const fn targets(&self) -> &ArrayD<f32> {
        &self.targets
    }

    /// Per-sample feature shape (without N)
    #[must_use]
    pub fn feature_shape(&self) -> &[usize] {
        &self.features.shape()[1..]
    }

    /// Per-sample target shape (without N)
    #[must_use]
    pub fn target_shape(&self) -> &[usize] {
        &self.targets.shape()[1..]
    }

    /// Borrow row `index` of both tensors, `None` past the end.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<(ArrayViewD<'_, f32>, ArrayViewD<'_, f32>)> {
        (index < self.len()).then(|| {
            (
                self.features.index_axis(Axis(0), index),
                self.targets.index_axis(Axis(0), index),
            )
        })
    }

    /// Split into `(features, targets)`.
    #[must_use]
    pub fn into_parts(self) -> (ArrayD<f32>, ArrayD<f32>) {
        (self.features, self.targets)
    }
}

/// Assembles and persists partitions.
pub struct PartitionBuilder;

impl PartitionBuilder {
    /// Convert one amplitude file and one velocity file into a sample.
    ///
    /// # Errors
    /// Returns conversion errors, or [`Error::ShapeMismatch`] when the files
    /// disagree on N
    pub fn build<A: AsRef<Path>, V: AsRef<Path>>(amplitude_path: A, velocity_path: V) -> Result<Sample> {
        let features = convert_amplitude(amplitude_path)?;
        let targets = convert_velocity(velocity_path)?;
        Sample::new(features, targets)
    }

    /// Write `sample` as the cache entry for `partition`, replacing any existing file.
    ///
    /// # Errors
    /// Returns error if the entry cannot be encoded or written
    pub fn persist<P: AsRef<Path>>(sample: &Sample, partition: Partition, destination: P) -> Result<()> {
        codec::write_entry(sample, partition, destination.as_ref())
    }

    /// Build and persist every partition from the raw files.
    ///
    /// # Errors
    /// Stops at the first conversion or write failure
    pub fn build_all(
        manifest: &DatasetManifest,
        raw: &RawStore,
        cache: &ProcessedCache,
    ) -> Result<()> {
        info!(dataset = %manifest.name, "processing raw files");
        for partition in Partition::ALL {
            let amplitudes = raw.path(manifest.raw_filename(partition.amplitude_role())?);
            let velocities = raw.path(manifest.raw_filename(partition.velocity_role())?);

            let sample = Self::build(&amplitudes, &velocities)?;
            debug!(
                %partition,
                samples = sample.len(),
                feature_shape = ?sample.feature_shape(),
                target_shape = ?sample.target_shape(),
                "built partition"
            );
            Self::persist(&sample, partition, cache.entry_path(partition))?;
        }
        info!(dataset = %manifest.name, "processing done");
        Ok(())
    }
}
