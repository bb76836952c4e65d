//! Integration tests for the acquisition → conversion → cache → access pipeline
//!
//! A local mirror stands in for the upstream host:
//! 1. Populate the cache through a counting fetcher
//! 2. Open each partition
//! 3. Read samples with and without transforms

use std::cell::Cell;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::rc::Rc;

use ndarray::{ArrayD, Axis};
use npyz::WriterBuilder;
use snist::fetch::{Fetcher, MirrorFetcher};
use snist::storage::CacheLayout;
use snist::{
    populate_cache, Dataset, DatasetManifest, Error, NoiseLevel, Partition, Snist, SnistOptions,
};
use tempfile::TempDir;

const TRAIN_N: u64 = 100;
const TEST_N: u64 = 20;
const HEIGHT: u64 = 4;
const WIDTH: u64 = 6;
const DEPTH: u64 = 8;

fn write_npy<T: npyz::AutoSerialize + Copy>(path: &Path, shape: &[u64], data: &[T]) {
    let file = File::create(path).unwrap();
    let mut writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(shape)
        .writer(BufWriter::new(file))
        .begin_nd()
        .unwrap();
    writer.extend(data.iter().copied()).unwrap();
    writer.finish().unwrap();
}

#[allow(clippy::cast_precision_loss)]
fn amplitudes(n: u64, offset: f64) -> Vec<f64> {
    (0..n * HEIGHT * WIDTH).map(|i| i as f64 + offset).collect()
}

#[allow(clippy::cast_precision_loss)]
fn velocities(n: u64) -> Vec<f32> {
    (0..n * DEPTH).map(|i| 1500.0 + i as f32).collect()
}

/// Mirror directory holding the six raw files of the default manifest
fn create_mirror() -> TempDir {
    let mirror = tempfile::tempdir().unwrap();
    let dir = mirror.path();

    write_npy(
        &dir.join("train_amplitudes.npy"),
        &[TRAIN_N, HEIGHT, WIDTH],
        &amplitudes(TRAIN_N, 0.0),
    );
    write_npy(&dir.join("train_velocities.npy"), &[TRAIN_N, DEPTH], &velocities(TRAIN_N));
    write_npy(
        &dir.join("test_amplitudes.npy"),
        &[TEST_N, HEIGHT, WIDTH],
        &amplitudes(TEST_N, 0.0),
    );
    write_npy(&dir.join("test_velocities.npy"), &[TEST_N, DEPTH], &velocities(TEST_N));
    write_npy(
        &dir.join("test_amplitudes_noise_1.npy"),
        &[TEST_N, HEIGHT, WIDTH],
        &amplitudes(TEST_N, 0.25),
    );
    write_npy(
        &dir.join("test_amplitudes_noise_2.npy"),
        &[TEST_N, HEIGHT, WIDTH],
        &amplitudes(TEST_N, 0.5),
    );

    mirror
}

/// Mirror fetcher that records how often it is asked for a file
#[derive(Clone)]
struct CountingFetcher {
    inner: MirrorFetcher,
    calls: Rc<Cell<usize>>,
}

impl CountingFetcher {
    fn new(mirror: &Path) -> Self {
        Self {
            inner: MirrorFetcher::new(mirror),
            calls: Rc::new(Cell::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> snist::Result<()> {
        self.calls.set(self.calls.get() + 1);
        self.inner.fetch(url, destination)
    }
}

fn populated_root(mirror: &Path) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let manifest = DatasetManifest::snist();
    let layout = CacheLayout::new(root.path(), &manifest);
    populate_cache(&layout, &manifest, &MirrorFetcher::new(mirror)).unwrap();
    root
}

#[test]
fn test_missing_cache_without_download() {
    let root = tempfile::tempdir().unwrap();

    let err = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap_err();

    assert!(matches!(err, Error::CacheMissing { .. }));
    assert!(err.to_string().contains("enable download"));
}

#[test]
fn test_download_then_open() {
    let mirror = create_mirror();
    let root = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher::new(mirror.path());

    let train = SnistOptions::new(root.path())
        .download(true)
        .fetcher(fetcher.clone())
        .open()
        .unwrap();

    assert_eq!(fetcher.calls(), 6);
    assert_eq!(train.len(), 100);
    assert!(!train.is_empty());
    assert_eq!(train.partition(), Partition::Training);
    assert_eq!(train.features().shape(), &[100, 1, 4, 6]);
    assert_eq!(train.targets().shape(), &[100, 8]);
    assert_eq!(train.header().num_samples, 100);

    let layout = CacheLayout::new(root.path(), &DatasetManifest::snist());
    for partition in Partition::ALL {
        assert!(layout.processed().entry_path(partition).is_file());
    }
    assert!(layout.raw().contains("test_amplitudes_noise_2.npy"));
}

#[test]
fn test_population_is_idempotent() {
    let mirror = create_mirror();
    let root = tempfile::tempdir().unwrap();
    let manifest = DatasetManifest::snist();
    let layout = CacheLayout::new(root.path(), &manifest);
    let fetcher = CountingFetcher::new(mirror.path());

    populate_cache(&layout, &manifest, &fetcher).unwrap();
    assert_eq!(fetcher.calls(), 6);
    let before: Vec<Vec<u8>> = Partition::ALL
        .iter()
        .map(|&p| std::fs::read(layout.processed().entry_path(p)).unwrap())
        .collect();

    populate_cache(&layout, &manifest, &fetcher).unwrap();
    assert_eq!(fetcher.calls(), 6, "second population must not fetch");
    let after: Vec<Vec<u8>> = Partition::ALL
        .iter()
        .map(|&p| std::fs::read(layout.processed().entry_path(p)).unwrap())
        .collect();

    assert_eq!(before, after);
}

#[test]
fn test_open_with_download_on_complete_cache_skips_fetcher() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let fetcher = CountingFetcher::new(mirror.path());

    let dataset = SnistOptions::new(root.path())
        .download(true)
        .fetcher(fetcher.clone())
        .open()
        .unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(dataset.len(), 100);
}

#[test]
fn test_test_variants_share_targets() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());

    let clean = Snist::new(root.path(), false, NoiseLevel::Clean, false).unwrap();
    let noise1 = Snist::new(root.path(), false, NoiseLevel::Level1, false).unwrap();
    let noise2 = Snist::new(root.path(), false, NoiseLevel::Level2, false).unwrap();

    assert_eq!(clean.partition(), Partition::TestNoise0);
    assert_eq!(noise1.partition(), Partition::TestNoise1);
    assert_eq!(noise2.partition(), Partition::TestNoise2);

    for index in 0..clean.len() {
        let (f0, t0) = clean.get(index).unwrap();
        let (f1, t1) = noise1.get(index).unwrap();
        let (f2, t2) = noise2.get(index).unwrap();
        assert_eq!(t0, t1);
        assert_eq!(t0, t2);
        assert_ne!(f0, f1);
        assert_ne!(f1, f2);
    }

    let (f0, _) = clean.get(3).unwrap();
    let (f1, _) = noise1.get(3).unwrap();
    assert!((&f1 - &f0).iter().all(|d| (d - 0.25).abs() < 1e-6));
}

#[test]
fn test_loading_never_reads_raw_files() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let layout = CacheLayout::new(root.path(), &DatasetManifest::snist());
    std::fs::remove_dir_all(layout.raw().dir()).unwrap();

    let train = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap();
    let noisy = Snist::new(root.path(), false, NoiseLevel::Level1, false).unwrap();

    assert_eq!(train.len(), 100);
    assert_eq!(noisy.len(), 20);
}

#[test]
fn test_index_boundaries() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let train = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap();

    assert_eq!(train.len(), 100);
    assert!(train.get(0).is_ok());
    assert!(train.get(99).is_ok());

    let err = train.get(100).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 100, len: 100 }));
    assert!(matches!(
        train.get(usize::MAX),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_untransformed_reads_return_stored_values() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let train = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap();

    let (item, label) = train.get(7).unwrap();

    assert_eq!(item.shape(), &[1, 4, 6]);
    assert_eq!(label.shape(), &[8]);
    assert_eq!(item, train.features().index_axis(Axis(0), 7));
    assert_eq!(label, train.targets().index_axis(Axis(0), 7));
    // Row 7 starts at flat offset 7 * H * W
    assert!((item[[0, 0, 0]] - 168.0).abs() < f32::EPSILON);
    assert!((label[[0]] - 1556.0).abs() < f32::EPSILON);
}

#[test]
fn test_transforms_apply_independently() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let plain = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap();
    let mapped = SnistOptions::new(root.path())
        .transform(|x: ArrayD<f32>| x * 2.0)
        .target_transform(|y: ArrayD<f32>| y - 1500.0)
        .open()
        .unwrap();

    for index in [0, 42, 99] {
        let (f, g) = plain.get(index).unwrap();
        let (tf, tg) = mapped.get(index).unwrap();
        assert_eq!(tf, f * 2.0);
        assert_eq!(tg, g - 1500.0);
    }

    // Stored tensors are untouched by reads
    assert_eq!(mapped.features(), plain.features());
}

#[test]
fn test_repeated_reads_are_reproducible() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let train = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap();

    assert_eq!(train.get(11).unwrap(), train.get(11).unwrap());
    assert_eq!(train.iter().count(), 100);
    assert!(train.iter().all(|r| r.is_ok()));
}

#[test]
fn test_incomplete_cache_is_rebuilt() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let manifest = DatasetManifest::snist();
    let layout = CacheLayout::new(root.path(), &manifest);
    std::fs::remove_file(layout.processed().entry_path(Partition::TestNoise2)).unwrap();

    let err = Snist::new(root.path(), false, NoiseLevel::Clean, false).unwrap_err();
    assert!(matches!(err, Error::CacheMissing { .. }));

    // Raw files are still present, so an empty mirror is enough to rebuild
    let empty = tempfile::tempdir().unwrap();
    let rebuilt = SnistOptions::new(root.path())
        .train(false)
        .noise(NoiseLevel::Level2)
        .download(true)
        .fetcher(MirrorFetcher::new(empty.path()))
        .open()
        .unwrap();
    assert_eq!(rebuilt.len(), 20);
}

#[test]
fn test_fetch_failure_then_retry() {
    let mirror = create_mirror();
    let root = tempfile::tempdir().unwrap();
    let stash = tempfile::tempdir().unwrap();
    let held_back = "test_velocities.npy";
    std::fs::rename(mirror.path().join(held_back), stash.path().join(held_back)).unwrap();

    let err = SnistOptions::new(root.path())
        .download(true)
        .fetcher(MirrorFetcher::new(mirror.path()))
        .open()
        .unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }));

    std::fs::rename(stash.path().join(held_back), mirror.path().join(held_back)).unwrap();
    let dataset = SnistOptions::new(root.path())
        .download(true)
        .fetcher(MirrorFetcher::new(mirror.path()))
        .open()
        .unwrap();
    assert_eq!(dataset.len(), 100);
}

#[test]
fn test_two_dimensional_amplitudes_abort_population() {
    let mirror = create_mirror();
    write_npy(
        &mirror.path().join("test_amplitudes_noise_1.npy"),
        &[TEST_N, HEIGHT * WIDTH],
        &amplitudes(TEST_N, 0.25),
    );
    let root = tempfile::tempdir().unwrap();

    let err = SnistOptions::new(root.path())
        .download(true)
        .fetcher(MirrorFetcher::new(mirror.path()))
        .open()
        .unwrap_err();

    assert!(matches!(err, Error::FormatError { .. }));
    assert!(err.to_string().contains("test_amplitudes_noise_1.npy"));
    let layout = CacheLayout::new(root.path(), &DatasetManifest::snist());
    assert!(!layout.processed().exists());
}

#[test]
fn test_corrupt_entry_fails_at_open() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let layout = CacheLayout::new(root.path(), &DatasetManifest::snist());
    std::fs::write(layout.processed().entry_path(Partition::Training), b"garbage").unwrap();

    let err = Snist::new(root.path(), true, NoiseLevel::Clean, false).unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));

    // Other partitions are unaffected
    assert!(Snist::new(root.path(), false, NoiseLevel::Clean, false).is_ok());
}

#[test]
fn test_custom_manifest_name() {
    let mirror = create_mirror();
    let root = tempfile::tempdir().unwrap();
    let mut manifest = DatasetManifest::snist();
    manifest.name = "SNIST-mirror".to_string();

    let dataset = SnistOptions::new(root.path())
        .manifest(manifest)
        .download(true)
        .fetcher(MirrorFetcher::new(mirror.path()))
        .open()
        .unwrap();

    assert!(root.path().join("SNIST-mirror/processed/training.pt").is_file());
    assert!(!root.path().join("SNIST").exists());
    assert!(dataset.to_string().starts_with("Dataset SNIST-mirror"));
}

#[test]
fn test_display_summary() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let test = SnistOptions::new(root.path())
        .train(false)
        .noise(NoiseLevel::Level1)
        .transform(|x: ArrayD<f32>| x)
        .open()
        .unwrap();

    let summary = test.to_string();
    assert!(summary.contains("Number of datapoints: 20"));
    assert!(summary.contains("Split: test"));
    assert!(summary.contains("Partition: test_noise_1"));
    assert!(summary.contains("Transforms (if any): set"));
    assert!(summary.contains("Target Transforms (if any): None"));
}

fn total_label_sum<D>(dataset: &D) -> f32
where
    D: Dataset<Item = ArrayD<f32>, Label = ArrayD<f32>>,
{
    (0..dataset.len())
        .map(|i| dataset.get(i).map(|(_, label)| label.sum()).unwrap_or(0.0))
        .sum()
}

#[test]
fn test_dataset_trait_object_usage() {
    let mirror = create_mirror();
    let root = populated_root(mirror.path());
    let test = Snist::new(root.path(), false, NoiseLevel::Clean, false).unwrap();

    assert!(!Dataset::is_empty(&test));
    assert!((total_label_sum(&test) - test.targets().sum()).abs() < 1.0);
}
