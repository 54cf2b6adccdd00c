use std::env;

use anyhow::Context;
use ndarray::Array;
use serde_json::json;

use training_artifacts::{
    persist_training_run, History, Metrics, PersistConfig, RenderedFigure, TensorModel,
    TrainingRun,
};

const LOSS_CURVE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="60">
<polyline fill="none" stroke="black" points="0,5 40,30 80,45 120,52"/>
</svg>
"#;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => PersistConfig::from_json_file(&path)
            .with_context(|| format!("cannot load config from {path}"))?,
        None => PersistConfig::default(),
    };

    let model = TensorModel::new(json!({
        "type": "sequential",
        "layers": [
            {"dense": {"dim": [1, 4], "act_fn": "sigmoid"}},
            {"dense": {"dim": [4, 1], "act_fn": null}},
        ],
    }))
    .with_tensor("dense_0.weight", Array::from_elem((4, 1), 0.5_f32).into_dyn())
    .with_tensor("dense_0.bias", Array::zeros(4).into_dyn())
    .with_tensor("dense_1.weight", Array::from_elem((1, 4), -0.25_f32).into_dyn())
    .with_tensor("dense_1.bias", Array::zeros(1).into_dyn());

    let mut history = History::new();
    for (loss, val_loss) in [(0.91, 0.95), (0.42, 0.51), (0.18, 0.27)] {
        history.record_epoch([("loss", loss), ("val_loss", val_loss)]);
    }

    let metrics = Metrics::from([("mae", 0.21), ("rmse", 0.29), ("r2", 0.87)]);

    let run = TrainingRun::new(&model, &history, &metrics)
        .with_figure(RenderedFigure::new(LOSS_CURVE_SVG), "loss_curve.svg");

    persist_training_run(config, run).context("persisting training run")?;
    println!("saved {} parameters", model.param_count());

    Ok(())
}
