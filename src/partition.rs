//! Partitions of the processed cache and the noise selector

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::manifest::SourceRole;
use crate::{Error, Result};

/// Noise level of a test partition.
///
/// Only meaningful for the test split; the training split has a single variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoiseLevel {
    /// Clean test amplitudes
    #[default]
    Clean,
    /// First noisy variant
    Level1,
    /// Second noisy variant
    Level2,
}

impl NoiseLevel {
    /// Numeric level (0, 1 or 2)
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Level1 => 1,
            Self::Level2 => 2,
        }
    }
}

impl TryFrom<i64> for NoiseLevel {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Clean),
            1 => Ok(Self::Level1),
            2 => Ok(Self::Level2),
            other => Err(Error::InvalidNoise(other)),
        }
    }
}

/// One serialized cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Training split
    Training,
    /// Test split, clean amplitudes
    TestNoise0,
    /// Test split, first noisy amplitudes
    TestNoise1,
    /// Test split, second noisy amplitudes
    TestNoise2,
}

impl Partition {
    /// Every partition the cache must hold
    pub const ALL: [Self; 4] = [
        Self::Training,
        Self::TestNoise0,
        Self::TestNoise1,
        Self::TestNoise2,
    ];

    /// Pick the partition for a split and noise level.
    ///
    /// `noise` is ignored when `train` is true.
    #[must_use]
    pub const fn select(train: bool, noise: NoiseLevel) -> Self {
        if train {
            return Self::Training;
        }
        match noise {
            NoiseLevel::Clean => Self::TestNoise0,
            NoiseLevel::Level1 => Self::TestNoise1,
            NoiseLevel::Level2 => Self::TestNoise2,
        }
    }

    /// Entry name without extension
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::TestNoise0 => "test_noise_0",
            Self::TestNoise1 => "test_noise_1",
            Self::TestNoise2 => "test_noise_2",
        }
    }

    /// Inverse of [`Partition::name`]
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|partition| partition.name() == name)
    }

    /// File name of the entry inside the processed directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.pt", self.name())
    }

    /// Whether this is the training split
    #[must_use]
    pub const fn is_train(self) -> bool {
        matches!(self, Self::Training)
    }

    /// Raw source providing the features
    #[must_use]
    pub const fn amplitude_role(self) -> SourceRole {
        match self {
            Self::Training => SourceRole::TrainAmplitudes,
            Self::TestNoise0 => SourceRole::TestAmplitudes,
            Self::TestNoise1 => SourceRole::TestAmplitudesNoise1,
            Self::TestNoise2 => SourceRole::TestAmplitudesNoise2,
        }
    }

    /// Raw source providing the targets.
    ///
    /// All test variants share the clean test velocities: noise perturbs the
    /// observed signal, not the ground truth.
    #[must_use]
    pub const fn velocity_role(self) -> SourceRole {
        match self {
            Self::Training => SourceRole::TrainVelocities,
            Self::TestNoise0 | Self::TestNoise1 | Self::TestNoise2 => SourceRole::TestVelocities,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
