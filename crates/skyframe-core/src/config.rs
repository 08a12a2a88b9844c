use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyframeError};

/// Options for one read call. Immutable for the duration of the call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Number of parallel workers; 1 decodes inline on the calling thread.
    pub workers: usize,
    /// Stop each file after its first frame.
    pub first_frame: bool,
    /// Record an empty metadata map for every frame.
    pub no_metadata: bool,
    /// Writable directory under which archives are extracted.
    pub scratch_dir: PathBuf,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            first_frame: false,
            no_metadata: false,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl ReadOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_first_frame(mut self, first_frame: bool) -> Self {
        self.first_frame = first_frame;
        self
    }

    pub fn with_no_metadata(mut self, no_metadata: bool) -> Self {
        self.no_metadata = no_metadata;
        self
    }

    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    /// Worker count clamped to at least one.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Load options from a TOML file; missing fields take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| SkyframeError::Decode(format!("invalid read configuration: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SkyframeError::Decode(format!("cannot serialize configuration: {e}")))
    }
}
