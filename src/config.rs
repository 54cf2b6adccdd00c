use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root directory used when the caller does not pick one.
pub const DEFAULT_BASE_DIR: &str = "../outputs/lstm";

/// File stem used when the caller does not pick one.
pub const DEFAULT_MODEL_NAME: &str = "lstm_model";

/// How the artifacts of a single run reach their final location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Each artifact is written in place, one after the other. A failing step leaves the
    /// earlier artifacts on disk.
    #[default]
    Direct,
    /// Artifacts are written to a private staging tree and only moved into place once every
    /// one of them was written.
    Staged,
}

/// Where and under which name the artifacts of a training run are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub base_dir: PathBuf,
    pub model_name: String,
    pub mode: PersistMode,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            mode: PersistMode::default(),
        }
    }
}

impl PersistConfig {
    /// Creates a new configuration rooted at `base_dir` with the default model name.
    ///
    /// # Arguments
    /// * `base_dir` - Root directory under which the artifact subfolders are created.
    ///
    /// # Returns
    /// A new `PersistConfig` instance.
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_model_name<S: Into<String>>(mut self, model_name: S) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_mode(mut self, mode: PersistMode) -> Self {
        self.mode = mode;
        self
    }

    /// Loads a configuration from a JSON file, missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an `ArtifactErr` if the file cannot be read or is not valid JSON.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
