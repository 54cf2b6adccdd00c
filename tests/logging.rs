use std::{cell::RefCell, path::Path, sync::Once};

use log::{
    kv::{Key, Source},
    Level, LevelFilter, Log, Metadata, Record,
};
use training_artifacts::{
    persist_training_run, ArtifactErr, Figure, History, Metrics, PersistConfig, PersistMode,
    RenderedFigure, Result, TensorModel, TrainingRun,
};

struct Captured {
    level: Level,
    message: String,
    path: Option<String>,
}

thread_local! {
    static RECORDS: RefCell<Vec<Captured>> = const { RefCell::new(Vec::new()) };
}

/// Keeps the records of each test thread apart, since tests share one global logger.
struct ThreadLogger;

impl Log for ThreadLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let path = record
            .key_values()
            .get(Key::from("path"))
            .map(|v| v.to_string());

        RECORDS.with(|records| {
            records.borrow_mut().push(Captured {
                level: record.level(),
                message: record.args().to_string(),
                path,
            })
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger;
static INIT: Once = Once::new();

fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<Captured>) {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });

    RECORDS.with(|records| records.borrow_mut().clear());
    let out = f();
    (out, RECORDS.with(RefCell::take))
}

/// Paths of the `info` confirmations, in emission order.
fn saved(records: &[Captured]) -> Vec<&str> {
    records
        .iter()
        .filter(|r| r.level == Level::Info && r.message == "artifact saved")
        .filter_map(|r| r.path.as_deref())
        .collect()
}

struct FailingFigure;

impl Figure for FailingFigure {
    fn save_fig(&self, _path: &Path) -> Result<()> {
        Err(ArtifactErr::Figure("backend has no display".into()))
    }
}

fn model() -> TensorModel {
    TensorModel::new(serde_json::json!({"type": "linear"}))
        .with_tensor("w", ndarray::arr1(&[1.0_f32, 2.0]).into_dyn())
}

fn config(base_dir: &Path, mode: PersistMode) -> PersistConfig {
    PersistConfig::new(base_dir)
        .with_model_name("lin")
        .with_mode(mode)
}

#[test]
fn direct_run_confirms_each_artifact_once() {
    let tmp = tempfile::tempdir().unwrap();
    let model = model();
    let history = History::new();
    let metrics = Metrics::from([("loss", 0.2)]);

    let run = TrainingRun::new(&model, &history, &metrics)
        .with_figure(RenderedFigure::new("a"), "a.svg")
        .with_figure(RenderedFigure::new("b"), "b.svg");
    let config = config(tmp.path(), PersistMode::Direct);
    let (res, records) = capture(|| persist_training_run(config, run));
    res.unwrap();

    let info = records.iter().filter(|r| r.level == Level::Info).count();
    assert_eq!(info, 4 + 2);
    assert_eq!(saved(&records).len(), 4 + 2);
}

#[test]
fn staged_confirmations_name_the_published_files() {
    let tmp = tempfile::tempdir().unwrap();
    let model = model();
    let history = History::new();
    let metrics = Metrics::from([("loss", 0.2)]);

    let run = TrainingRun::new(&model, &history, &metrics)
        .with_figure(RenderedFigure::new("<svg/>"), "loss.svg");
    let config = config(tmp.path(), PersistMode::Staged);
    let (res, records) = capture(|| persist_training_run(config, run));
    res.unwrap();

    let info = records.iter().filter(|r| r.level == Level::Info).count();
    assert_eq!(info, 4 + 1);

    let paths = saved(&records);
    assert_eq!(paths.len(), 4 + 1);
    for path in paths {
        assert!(!path.contains(".staging-"), "{path}");
        assert!(Path::new(path).starts_with(tmp.path()), "{path}");
        assert!(Path::new(path).is_file(), "{path}");
    }
    assert_eq!(
        saved(&records).last().copied(),
        tmp.path().join("figures/loss.svg").to_str()
    );
}

#[test]
fn failed_staged_run_confirms_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let model = model();
    let history = History::new();
    let metrics = Metrics::new();

    let run = TrainingRun::new(&model, &history, &metrics).with_figure(FailingFigure, "x.png");
    let config = config(tmp.path(), PersistMode::Staged);
    let (res, records) = capture(|| persist_training_run(config, run));

    assert!(matches!(res, Err(ArtifactErr::Figure(_))));
    assert!(saved(&records).is_empty());
    assert!(records.iter().all(|r| r.level != Level::Info));
}
