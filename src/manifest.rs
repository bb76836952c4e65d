//! Dataset manifest: which raw files exist and what each one is for
//!
//! The manifest is an immutable value handed to the pipeline, so an alternate
//! mirror or a trimmed-down fixture set can be substituted without code changes.
//!
//! ```rust
//! use snist::manifest::{DatasetManifest, SourceRole};
//!
//! let manifest = DatasetManifest::snist();
//! let source = manifest.source(SourceRole::TrainAmplitudes).unwrap();
//! assert_eq!(source.raw_filename, "train_amplitudes.npy");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SNIST_BASE_URL: &str = "https://raw.githubusercontent.com/LukasMosser/SNIST/master/data";

/// What a raw file contributes to the partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Training amplitudes `[N, H, W]`
    TrainAmplitudes,
    /// Training velocities
    TrainVelocities,
    /// Clean test amplitudes
    TestAmplitudes,
    /// Test velocities (shared by every test variant)
    TestVelocities,
    /// Test amplitudes, first noise level
    TestAmplitudesNoise1,
    /// Test amplitudes, second noise level
    TestAmplitudesNoise2,
}

impl SourceRole {
    /// Every role a complete manifest provides
    pub const ALL: [Self; 6] = [
        Self::TrainAmplitudes,
        Self::TrainVelocities,
        Self::TestAmplitudes,
        Self::TestVelocities,
        Self::TestAmplitudesNoise1,
        Self::TestAmplitudesNoise2,
    ];
}

/// One downloadable raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Remote location
    pub url: String,
    /// File name under the raw directory
    #[serde(default)]
    pub raw_filename: String,
    /// Contribution to the partitions
    pub role: SourceRole,
}

impl SourceFile {
    /// Create a source whose file name is the URL's final path segment.
    #[must_use]
    pub fn new(url: impl Into<String>, role: SourceRole) -> Self {
        let url = url.into();
        let raw_filename = filename_from_url(&url).to_string();
        Self {
            url,
            raw_filename,
            role,
        }
    }
}

/// Final path segment of `url`, ignoring any query or fragment.
#[must_use]
pub fn filename_from_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    path.rsplit('/').next().unwrap_or(path)
}

/// Immutable description of a dataset's raw sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Directory name under the root (`<root>/<name>/raw`, `<root>/<name>/processed`)
    pub name: String,
    /// Raw files, fetched in order
    pub sources: Vec<SourceFile>,
}

impl DatasetManifest {
    /// The upstream SNIST release.
    #[must_use]
    pub fn snist() -> Self {
        let sources = [
            ("train/train_amplitudes.npy", SourceRole::TrainAmplitudes),
            ("train/train_velocities.npy", SourceRole::TrainVelocities),
            ("test/test_amplitudes.npy", SourceRole::TestAmplitudes),
            ("test/test_velocities.npy", SourceRole::TestVelocities),
            ("test/test_amplitudes_noise_1.npy", SourceRole::TestAmplitudesNoise1),
            ("test/test_amplitudes_noise_2.npy", SourceRole::TestAmplitudesNoise2),
        ]
        .into_iter()
        .map(|(path, role)| SourceFile::new(format!("{SNIST_BASE_URL}/{path}"), role))
        .collect();

        Self {
            name: "SNIST".to_string(),
            sources,
        }
    }

    /// Load and validate a manifest from a JSON file.
    ///
    /// Sources without a `raw_filename` get one derived from their URL.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a manifest from JSON text.
    ///
    /// # Errors
    /// Returns error if the text is not a valid manifest
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut manifest: Self = serde_json::from_str(content)?;
        for source in &mut manifest.sources {
            if source.raw_filename.is_empty() {
                source.raw_filename = filename_from_url(&source.url).to_string();
            }
        }
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check that every role is provided exactly once with a usable file name.
    ///
    /// # Errors
    /// Returns [`Error::InvalidManifest`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(Error::InvalidManifest(format!(
                "dataset name {:?} is not a single directory name",
                self.name
            )));
        }

        for source in &self.sources {
            let name = source.raw_filename.as_str();
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(Error::InvalidManifest(format!(
                    "cannot derive a file name for {}",
                    source.url
                )));
            }
        }

        for role in SourceRole::ALL {
            let count = self.sources.iter().filter(|s| s.role == role).count();
            if count != 1 {
                return Err(Error::InvalidManifest(format!(
                    "role {role:?} provided {count} times (expected exactly once)"
                )));
            }
        }

        Ok(())
    }

    /// Source for `role`, if present.
    #[must_use]
    pub fn source(&self, role: SourceRole) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.role == role)
    }

    /// Raw file name for `role`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidManifest`] if no source has this role
    pub fn raw_filename(&self, role: SourceRole) -> Result<&str> {
        self.source(role)
            .map(|s| s.raw_filename.as_str())
            .ok_or_else(|| Error::InvalidManifest(format!("no source for role {role:?}")))
    }
}

impl Default for DatasetManifest {
    fn default() -> Self {
        Self::snist()
    }
}
