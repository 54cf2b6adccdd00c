use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use log::{debug, info, log, warn, Level};
use tempfile::TempDir;

use crate::{
    config::{PersistConfig, PersistMode},
    error::Result,
    figure::Figure,
    history::History,
    layout::ArtifactLayout,
    metrics::Metrics,
    model::Model,
};

type NamedFigure<'a> = (Box<dyn Figure + 'a>, String);

/// Written files as `(artifact kind, path)`, in writing order.
type Written = Vec<(&'static str, PathBuf)>;

/// Everything a finished training run hands over for persistence.
pub struct TrainingRun<'a> {
    model: &'a dyn Model,
    history: &'a History,
    metrics: &'a Metrics,
    figures: Vec<NamedFigure<'a>>,
}

impl<'a> TrainingRun<'a> {
    /// Creates a new `TrainingRun` without figures.
    ///
    /// # Arguments
    /// * `model` - The trained model.
    /// * `history` - The per-epoch metric trajectories.
    /// * `metrics` - The final evaluation metrics.
    ///
    /// # Returns
    /// A new `TrainingRun` instance.
    pub fn new(model: &'a dyn Model, history: &'a History, metrics: &'a Metrics) -> Self {
        Self {
            model,
            history,
            metrics,
            figures: Vec::new(),
        }
    }

    /// Adds a figure to be saved as `figures/<filename>`. Figures are saved in insertion order.
    pub fn with_figure<F, S>(mut self, figure: F, filename: S) -> Self
    where
        F: Figure + 'a,
        S: Into<String>,
    {
        self.figures.push((Box::new(figure), filename.into()));
        self
    }

    pub fn figure_count(&self) -> usize {
        self.figures.len()
    }
}

/// Writes training artifacts under a single base directory.
#[derive(Debug, Clone)]
pub struct Persister {
    layout: ArtifactLayout,
    mode: PersistMode,
}

impl Persister {
    pub fn new(config: PersistConfig) -> Self {
        Self {
            layout: ArtifactLayout::new(config.base_dir, config.model_name),
            mode: config.mode,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Saves a single figure as `figures/<filename>` and releases it afterwards.
    ///
    /// # Errors
    /// Returns an `ArtifactErr` if the figures directory cannot be created or the figure
    /// cannot be written. The figure is then dropped without an explicit `close`.
    pub fn persist_figure<F: Figure>(&self, figure: F, filename: &str) -> Result<()> {
        self.layout.ensure_figures_dir()?;
        write_figure(&self.layout, Level::Info, figure, filename)?;
        Ok(())
    }

    /// Persists every artifact of `run`.
    ///
    /// Layout, relative to the base directory:
    /// * `saved_models/<name>.<ext>` - the whole model.
    /// * `saved_models/<name>_weights.<ext>` - the weights only.
    /// * `saved_models/<name>_history.json` - the training history.
    /// * `metrics/<name>_metrics.txt` - the final metrics.
    /// * `figures/<filename>` - one file per figure.
    ///
    /// # Errors
    /// Returns the first failure. In `Direct` mode artifacts written before it stay on disk;
    /// in `Staged` mode none of this run's artifacts are published, and a figure filename
    /// that is absolute or climbs out with `..` fails with `io::ErrorKind::InvalidInput`
    /// before anything is written.
    pub fn persist(&self, run: TrainingRun<'_>) -> Result<()> {
        self.layout.ensure_dirs()?;

        match self.mode {
            PersistMode::Direct => {
                write_artifacts(&self.layout, Level::Info, run)?;
            }
            PersistMode::Staged => self.persist_staged(run)?,
        }

        Ok(())
    }

    /// Reads back the history saved for the configured model name.
    pub fn load_history(&self) -> Result<History> {
        History::load(self.layout.history_path())
    }

    /// Reads back the metrics saved for the configured model name.
    pub fn load_metrics(&self) -> Result<Metrics> {
        Metrics::read_from(self.layout.metrics_path())
    }

    /// Writes into a fresh hidden directory under the base directory, then moves every file
    /// into place. Confirmations name the published paths and are logged once all of them
    /// are in place.
    fn persist_staged(&self, run: TrainingRun<'_>) -> Result<()> {
        for (_, filename) in &run.figures {
            check_staged_filename(filename)?;
        }

        let staging_dir = create_staging_dir(self.layout.base_dir())?;
        let staging = self.layout.rebased(staging_dir.path());

        let published = staging
            .ensure_dirs()
            .and_then(|_| write_artifacts(&staging, Level::Debug, run))
            .and_then(|written| publish(staging_dir.path(), self.layout.base_dir(), written));

        let dir = staging_dir.path().to_path_buf();
        if let Err(e) = staging_dir.close() {
            warn!(dir:% = dir.display(), error:% = e; "failed to remove staging directory");
        }

        let published = published?;
        for (artifact, path) in &published {
            info!(artifact = *artifact, path:% = path.display(); "artifact saved");
        }
        debug!(
            base_dir:% = self.layout.base_dir().display(),
            artifacts = published.len();
            "staged artifacts published"
        );

        Ok(())
    }
}

/// Writes the artifacts of `run` in order: model, weights, history, metrics, figures.
///
/// # Returns
/// The written paths, relative to the layout's base directory.
fn write_artifacts(
    layout: &ArtifactLayout,
    level: Level,
    run: TrainingRun<'_>,
) -> Result<Written> {
    let TrainingRun {
        model,
        history,
        metrics,
        figures,
    } = run;
    let mut written = Vec::with_capacity(4 + figures.len());

    let path = layout.model_path(model.extension());
    model.save(&path)?;
    written.push(confirm(layout, level, "model", path));

    let path = layout.weights_path(model.weights_extension());
    model.save_weights(&path)?;
    written.push(confirm(layout, level, "weights", path));

    let path = layout.history_path();
    history.save(&path)?;
    written.push(confirm(layout, level, "history", path));

    let path = layout.metrics_path();
    metrics.write_to(&path)?;
    written.push(confirm(layout, level, "metrics", path));

    for (figure, filename) in figures {
        written.push(write_figure(layout, level, figure, &filename)?);
    }

    Ok(written)
}

fn write_figure<F: Figure>(
    layout: &ArtifactLayout,
    level: Level,
    mut figure: F,
    filename: &str,
) -> Result<(&'static str, PathBuf)> {
    let path = layout.figure_path(filename);
    figure.save_fig(&path)?;
    figure.close();
    Ok(confirm(layout, level, "figure", path))
}

/// Logs a written artifact and returns its path relative to the base directory.
fn confirm(
    layout: &ArtifactLayout,
    level: Level,
    artifact: &'static str,
    path: PathBuf,
) -> (&'static str, PathBuf) {
    log!(level, artifact = artifact, path:% = path.display(); "artifact saved");

    let relative = path.strip_prefix(layout.base_dir()).map(Path::to_path_buf);
    (artifact, relative.unwrap_or(path))
}

/// Staged figures must land inside the staging tree.
fn check_staged_filename(filename: &str) -> Result<()> {
    let escapes = Path::new(filename)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if escapes {
        let msg = format!("figure filename {filename:?} must stay inside the figures directory");
        return Err(io::Error::new(io::ErrorKind::InvalidInput, msg).into());
    }

    Ok(())
}

/// A uniquely named hidden directory, removed when dropped.
fn create_staging_dir(base_dir: &Path) -> io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(base_dir)
}

/// Moves every staged file to the same relative location under `base_dir`.
///
/// # Returns
/// The published paths.
fn publish(staging_dir: &Path, base_dir: &Path, written: Written) -> Result<Written> {
    written
        .into_iter()
        .map(|(artifact, relative)| -> Result<(&'static str, PathBuf)> {
            let target = base_dir.join(&relative);
            fs::rename(staging_dir.join(&relative), &target)?;
            Ok((artifact, target))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{error::ArtifactErr, figure::RenderedFigure};

    struct StubModel;

    impl Model for StubModel {
        fn extension(&self) -> &str {
            "h5"
        }

        fn save(&self, path: &Path) -> Result<()> {
            fs::write(path, b"model")?;
            Ok(())
        }

        fn save_weights(&self, path: &Path) -> Result<()> {
            fs::write(path, b"weights")?;
            Ok(())
        }
    }

    struct CountingFigure<'c> {
        closed: &'c Cell<usize>,
    }

    impl Figure for CountingFigure<'_> {
        fn save_fig(&self, path: &Path) -> Result<()> {
            fs::write(path, b"png")?;
            Ok(())
        }

        fn close(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    #[test]
    fn confirm_returns_relative_paths() {
        let layout = ArtifactLayout::new("/runs/a", "m");
        let path = layout.metrics_path();
        let (artifact, relative) = confirm(&layout, Level::Info, "metrics", path);
        assert_eq!(artifact, "metrics");
        assert_eq!(relative, Path::new("metrics/m_metrics.txt"));
    }

    #[test]
    fn write_artifacts_reports_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(tmp.path(), "m");
        layout.ensure_dirs().unwrap();

        let closed = Cell::new(0);
        let history = History::new();
        let metrics = Metrics::new();
        let run = TrainingRun::new(&StubModel, &history, &metrics)
            .with_figure(CountingFigure { closed: &closed }, "a.png")
            .with_figure(RenderedFigure::new("b"), "b.svg");

        let written = write_artifacts(&layout, Level::Info, run).unwrap();

        let expected: Written = [
            ("model", "saved_models/m.h5"),
            ("weights", "saved_models/m_weights.h5"),
            ("history", "saved_models/m_history.json"),
            ("metrics", "metrics/m_metrics.txt"),
            ("figure", "figures/a.png"),
            ("figure", "figures/b.svg"),
        ]
        .into_iter()
        .map(|(artifact, path)| (artifact, PathBuf::from(path)))
        .collect();
        assert_eq!(written, expected);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn publish_returns_the_final_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(tmp.path(), "m");
        layout.ensure_dirs().unwrap();

        let staging_dir = create_staging_dir(tmp.path()).unwrap();
        let staging = layout.rebased(staging_dir.path());
        staging.ensure_dirs().unwrap();

        let history = History::new();
        let metrics = Metrics::new();
        let run = TrainingRun::new(&StubModel, &history, &metrics)
            .with_figure(RenderedFigure::new("b"), "b.svg");
        let written = write_artifacts(&staging, Level::Debug, run).unwrap();

        let published = publish(staging_dir.path(), tmp.path(), written).unwrap();

        assert_eq!(published.len(), 5);
        for (_, path) in &published {
            assert!(path.starts_with(tmp.path()), "{}", path.display());
            assert!(!path.starts_with(staging_dir.path()), "{}", path.display());
            assert!(path.is_file(), "{}", path.display());
        }
        assert_eq!(published[4], ("figure", tmp.path().join("figures/b.svg")));
        assert!(!staging.figure_path("b.svg").exists());
    }

    #[test]
    fn staging_dirs_are_hidden_and_unique() {
        let tmp = tempfile::tempdir().unwrap();

        let first = create_staging_dir(tmp.path()).unwrap();
        let second = create_staging_dir(tmp.path()).unwrap();

        assert_ne!(first.path(), second.path());
        for dir in [&first, &second] {
            assert_eq!(dir.path().parent(), Some(tmp.path()));
            let name = dir.path().file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with(".staging-"), "{name}");
        }

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
    }

    #[test]
    fn staged_filenames_must_stay_in_the_figures_dir() {
        for ok in ["curve.png", "./curve.png", "plots/curve.png"] {
            assert!(check_staged_filename(ok).is_ok(), "{ok}");
        }

        for bad in ["/tmp/curve.png", "../curve.png", "plots/../../curve.png"] {
            match check_staged_filename(bad) {
                Err(ArtifactErr::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
                other => panic!("{bad}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn persist_figure_creates_only_the_figures_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let persister = Persister::new(PersistConfig::new(tmp.path()));

        persister
            .persist_figure(RenderedFigure::new("svg"), "curve.svg")
            .unwrap();

        assert_eq!(fs::read(tmp.path().join("figures/curve.svg")).unwrap(), b"svg");
        assert!(!tmp.path().join("saved_models").exists());
        assert!(!tmp.path().join("metrics").exists());
    }

    #[test]
    fn persist_figure_failure_skips_close() {
        let tmp = tempfile::tempdir().unwrap();
        let persister = Persister::new(PersistConfig::new(tmp.path()));
        let closed = Cell::new(0);

        let figure = CountingFigure { closed: &closed };
        let res = persister.persist_figure(figure, "missing/dir.png");

        assert!(matches!(res, Err(ArtifactErr::Io(_))));
        assert_eq!(closed.get(), 0);
    }
}
