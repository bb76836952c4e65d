//! # SNIST: cached, indexed access to the SNIST seismic benchmark
//!
//! SNIST pairs seismic amplitude recordings with the velocity profiles that
//! produced them. This crate downloads the raw `.npy` files once, converts them
//! into `f32` tensors, stores one Parquet entry per partition, and serves a
//! single partition through an indexed, lazily-transformed view.
//!
//! ## Pipeline
//!
//! ```text
//! manifest ──fetch──> raw/*.npy ──convert──> Sample ──persist──> processed/*.pt
//!                                                                    │
//!                                                     Snist::get <──load
//! ```
//!
//! - Amplitudes `[N, H, W]` become features `[N, 1, H, W]`
//! - Velocities keep their shape and become targets
//! - Partitions: `training`, `test_noise_0`, `test_noise_1`, `test_noise_2`;
//!   the test variants share one target tensor
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use snist::{NoiseLevel, Snist};
//!
//! let train = Snist::new("data", true, NoiseLevel::Clean, true)?;
//! println!("{train}");
//!
//! for index in 0..train.len() {
//!     let (amplitudes, velocities) = train.get(index)?;
//!     assert_eq!(amplitudes.ndim(), 3);
//!     # let _ = velocities;
//! }
//! # Ok::<(), snist::Error>(())
//! ```
//!
//! Population is single-writer: do not populate one root from several
//! processes at the same time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod convert;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod partition;
pub mod pipeline;
pub mod sample;
pub mod storage;
pub mod transform;

pub use dataset::{Dataset, Snist, SnistOptions};
pub use error::{Error, Result};
pub use manifest::{DatasetManifest, SourceFile, SourceRole};
pub use partition::{NoiseLevel, Partition};
pub use pipeline::populate_cache;
pub use sample::{PartitionBuilder, Sample};
pub use transform::{Compose, Transform};
