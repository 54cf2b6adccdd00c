pub mod config;
pub mod error;
pub mod figure;
pub mod history;
pub mod layout;
pub mod metrics;
pub mod model;
mod persister;

pub use config::{PersistConfig, PersistMode};
pub use error::{ArtifactErr, Result};
pub use figure::{Figure, RenderedFigure};
pub use history::History;
pub use layout::ArtifactLayout;
pub use metrics::{MetricValue, Metrics};
pub use model::{Model, TensorModel};
pub use persister::{Persister, TrainingRun};

/// Persists the model, weights, history, metrics and figures of a finished training run.
///
/// # Errors
/// Returns an `ArtifactErr` as soon as any artifact fails to be written.
pub fn persist_training_run(config: PersistConfig, run: TrainingRun<'_>) -> Result<()> {
    log::debug!(
        model_name:% = config.model_name,
        base_dir:% = config.base_dir.display(),
        figures = run.figure_count();
        "persisting training run"
    );
    Persister::new(config).persist(run)
}

/// Saves a single figure under `<base_dir>/figures/<filename>`.
///
/// # Errors
/// Returns an `ArtifactErr` if the figure cannot be written.
pub fn persist_figure<F: Figure>(config: PersistConfig, figure: F, filename: &str) -> Result<()> {
    Persister::new(config).persist_figure(figure, filename)
}
