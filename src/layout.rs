use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::error::Result;

pub const SAVED_MODELS_DIR: &str = "saved_models";
pub const METRICS_DIR: &str = "metrics";
pub const FIGURES_DIR: &str = "figures";

pub const HISTORY_EXTENSION: &str = "json";
pub const METRICS_EXTENSION: &str = "txt";

/// Resolves where every artifact of a model lives under a base directory.
///
/// Nothing here touches the filesystem except `ensure_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    base_dir: PathBuf,
    model_name: String,
}

impl ArtifactLayout {
    /// Creates a new `ArtifactLayout`.
    ///
    /// # Arguments
    /// * `base_dir` - Root directory of the three artifact subfolders.
    /// * `model_name` - File stem shared by every model related artifact.
    ///
    /// # Returns
    /// A new `ArtifactLayout` instance.
    pub fn new<P: Into<PathBuf>, S: Into<String>>(base_dir: P, model_name: S) -> Self {
        Self {
            base_dir: base_dir.into(),
            model_name: model_name.into(),
        }
    }

    /// The same model name resolved under another base directory.
    pub fn rebased<P: Into<PathBuf>>(&self, base_dir: P) -> Self {
        Self::new(base_dir, self.model_name.clone())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn saved_models_dir(&self) -> PathBuf {
        self.base_dir.join(SAVED_MODELS_DIR)
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.base_dir.join(METRICS_DIR)
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.base_dir.join(FIGURES_DIR)
    }

    /// `saved_models/<model_name>.<extension>`
    pub fn model_path(&self, extension: &str) -> PathBuf {
        self.saved_models_dir()
            .join(format!("{}.{extension}", self.model_name))
    }

    /// `saved_models/<model_name>_weights.<extension>`
    pub fn weights_path(&self, extension: &str) -> PathBuf {
        self.saved_models_dir()
            .join(format!("{}_weights.{extension}", self.model_name))
    }

    /// `saved_models/<model_name>_history.json`
    pub fn history_path(&self) -> PathBuf {
        self.saved_models_dir()
            .join(format!("{}_history.{HISTORY_EXTENSION}", self.model_name))
    }

    /// `metrics/<model_name>_metrics.txt`
    pub fn metrics_path(&self) -> PathBuf {
        self.metrics_dir()
            .join(format!("{}_metrics.{METRICS_EXTENSION}", self.model_name))
    }

    /// `figures/<filename>`, the filename is used verbatim.
    pub fn figure_path(&self, filename: &str) -> PathBuf {
        self.figures_dir().join(filename)
    }

    /// Creates the three artifact subfolders, existing ones are left alone.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::Io` if any of the directories cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.saved_models_dir(),
            self.metrics_dir(),
            self.figures_dir(),
        ] {
            ensure_dir(&dir)?;
        }

        Ok(())
    }

    /// Creates only the figures subfolder.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::Io` if the directory cannot be created.
    pub fn ensure_figures_dir(&self) -> Result<()> {
        ensure_dir(&self.figures_dir())
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    debug!(dir:% = dir.display(); "directory ensured");
    Ok(())
}
