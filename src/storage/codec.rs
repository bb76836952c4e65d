//! Parquet encoding of cache entries
//!
//! One row per sample, two non-null `FixedSizeList<Float32>` columns
//! (`features`, `targets`). Per-sample shapes and the sample count live in the
//! Arrow schema metadata, so empty partitions still round-trip their shape.
//!
//! | Metadata key | Value |
//! |---|---|
//! | `snist.partition` | partition name, e.g. `test_noise_1` |
//! | `snist.num_samples` | decimal N |
//! | `snist.feature_shape` | JSON array of per-sample dims, e.g. `[1,201,301]` |
//! | `snist.target_shape` | JSON array, `[]` for scalar targets |
//! | `snist.created_at` | RFC 3339 timestamp |
//!
//! Samples with a zero-sized per-sample shape cannot be stored: a zero-width
//! fixed-size list has no rows to carry N.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, FixedSizeListArray, Float32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::partition::Partition;
use crate::sample::Sample;
use crate::{Error, Result};

/// Metadata key: partition name
pub const PARTITION_KEY: &str = "snist.partition";
/// Metadata key: number of samples
pub const NUM_SAMPLES_KEY: &str = "snist.num_samples";
/// Metadata key: per-sample feature shape
pub const FEATURE_SHAPE_KEY: &str = "snist.feature_shape";
/// Metadata key: per-sample target shape
pub const TARGET_SHAPE_KEY: &str = "snist.target_shape";
/// Metadata key: write timestamp
pub const CREATED_AT_KEY: &str = "snist.created_at";

const FEATURES_COLUMN: &str = "features";
const TARGETS_COLUMN: &str = "targets";

/// Description of a cache entry, stored alongside the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Partition the entry was built for
    pub partition: Partition,
    /// Number of samples (N)
    pub num_samples: usize,
    /// Per-sample feature shape, e.g. `[1, H, W]`
    pub feature_shape: Vec<usize>,
    /// Per-sample target shape, `[]` for scalar targets
    pub target_shape: Vec<usize>,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl EntryHeader {
    fn full_shape(&self, per_sample: &[usize]) -> Vec<usize> {
        std::iter::once(self.num_samples)
            .chain(per_sample.iter().copied())
            .collect()
    }

    fn to_metadata(&self) -> Result<HashMap<String, String>> {
        Ok(HashMap::from([
            (PARTITION_KEY.to_string(), self.partition.name().to_string()),
            (NUM_SAMPLES_KEY.to_string(), self.num_samples.to_string()),
            (FEATURE_SHAPE_KEY.to_string(), serde_json::to_string(&self.feature_shape)?),
            (TARGET_SHAPE_KEY.to_string(), serde_json::to_string(&self.target_shape)?),
            (CREATED_AT_KEY.to_string(), self.created_at.to_rfc3339()),
        ]))
    }

    fn from_metadata(metadata: &HashMap<String, String>) -> std::result::Result<Self, String> {
        let get = |key: &str| {
            metadata
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| format!("missing `{key}` schema metadata"))
        };
        let shape = |key: &str| -> std::result::Result<Vec<usize>, String> {
            serde_json::from_str(get(key)?).map_err(|e| format!("bad `{key}` metadata: {e}"))
        };

        let partition = get(PARTITION_KEY)?;
        let partition = Partition::from_name(partition)
            .ok_or_else(|| format!("unknown partition `{partition}`"))?;
        let num_samples = get(NUM_SAMPLES_KEY)?
            .parse()
            .map_err(|e| format!("bad `{NUM_SAMPLES_KEY}` metadata: {e}"))?;
        let created_at = DateTime::parse_from_rfc3339(get(CREATED_AT_KEY)?)
            .map_err(|e| format!("bad `{CREATED_AT_KEY}` metadata: {e}"))?
            .with_timezone(&Utc);

        Ok(Self {
            partition,
            num_samples,
            feature_shape: shape(FEATURE_SHAPE_KEY)?,
            target_shape: shape(TARGET_SHAPE_KEY)?,
            created_at,
        })
    }
}

/// Encode `sample` and write it to `destination` via a temporary sibling.
///
/// # Errors
/// Returns [`Error::StorageError`] for a zero-sized per-sample shape, before
/// anything is written. Otherwise returns error if encoding or any filesystem
/// step fails; the temporary file is removed on failure
pub fn write_entry(sample: &Sample, partition: Partition, destination: &Path) -> Result<()> {
    let header = EntryHeader {
        partition,
        num_samples: sample.len(),
        feature_shape: sample.feature_shape().to_vec(),
        target_shape: sample.target_shape().to_vec(),
        created_at: Utc::now(),
    };
    let batch = to_record_batch(sample, &header)?;

    let tmp = temp_sibling(destination);
    let written =
        write_batch(&batch, &tmp).and_then(|()| fs::rename(&tmp, destination).map_err(Error::from));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written?;

    debug!(%partition, path = %destination.display(), rows = header.num_samples, "wrote cache entry");
    Ok(())
}

/// Read the header of the entry at `path` without decoding the data.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be opened and
/// [`Error::Deserialization`] if it is not a valid entry
pub fn read_header(path: &Path) -> Result<EntryHeader> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(corrupt(path))?;
    EntryHeader::from_metadata(builder.schema().metadata()).map_err(corrupt(path))
}

/// Decode the entry at `path`.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be opened and
/// [`Error::Deserialization`] for any decoding problem
pub fn load_entry(path: &Path) -> Result<(EntryHeader, Sample)> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(corrupt(path))?;
    let header = EntryHeader::from_metadata(builder.schema().metadata()).map_err(corrupt(path))?;
    let reader = builder.build().map_err(corrupt(path))?;

    let mut features = Vec::new();
    let mut targets = Vec::new();
    for batch in reader {
        let batch = batch.map_err(corrupt(path))?;
        extend_from_column(&batch, FEATURES_COLUMN, &mut features).map_err(corrupt(path))?;
        extend_from_column(&batch, TARGETS_COLUMN, &mut targets).map_err(corrupt(path))?;
    }

    let features = ArrayD::from_shape_vec(IxDyn(&header.full_shape(&header.feature_shape)), features)
        .map_err(corrupt(path))?;
    let targets = ArrayD::from_shape_vec(IxDyn(&header.full_shape(&header.target_shape)), targets)
        .map_err(corrupt(path))?;
    let sample = Sample::new(features, targets).map_err(corrupt(path))?;

    Ok((header, sample))
}

fn to_record_batch(sample: &Sample, header: &EntryHeader) -> Result<RecordBatch> {
    let features = fixed_size_list(sample.features(), &header.feature_shape)?;
    let targets = fixed_size_list(sample.targets(), &header.target_shape)?;

    let metadata = header.to_metadata()?;

    let schema = Schema::new(vec![
        Field::new(FEATURES_COLUMN, features.data_type().clone(), false),
        Field::new(TARGETS_COLUMN, targets.data_type().clone(), false),
    ])
    .with_metadata(metadata);

    let columns: Vec<ArrayRef> = vec![Arc::new(features), Arc::new(targets)];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

fn fixed_size_list(array: &ArrayD<f32>, per_sample: &[usize]) -> Result<FixedSizeListArray> {
    let width: usize = per_sample.iter().product();
    if width == 0 {
        return Err(Error::StorageError(format!(
            "cannot store per-sample shape {per_sample:?}: every dimension must be non-zero"
        )));
    }
    let size = i32::try_from(width).map_err(|_| {
        Error::StorageError(format!("per-sample shape {per_sample:?} is too large for one row"))
    })?;

    // Logical (row-major) order regardless of the source memory layout
    let values = Float32Array::from_iter_values(array.iter().copied());
    let item = Arc::new(Field::new("item", DataType::Float32, false));
    Ok(FixedSizeListArray::try_new(item, size, Arc::new(values), None)?)
}

fn write_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn extend_from_column(
    batch: &RecordBatch,
    name: &str,
    out: &mut Vec<f32>,
) -> std::result::Result<(), String> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| format!("missing column `{name}`"))?;
    let list = column
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| format!("column `{name}` is not a fixed-size list"))?;
    let values = list
        .values()
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| format!("column `{name}` does not hold f32 values"))?;

    out.extend_from_slice(values.values());
    Ok(())
}

fn temp_sibling(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    destination.with_file_name(name)
}

fn corrupt<E: Display>(path: &Path) -> impl FnOnce(E) -> Error + '_ {
    move |e| Error::deserialization(path, e)
}
