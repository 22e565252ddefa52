//! The runnable experiments behind the CLI and the demos
//!
//! Each experiment writes its CSV/JSON/DOT files into an output directory
//! and returns a serializable summary.

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compare::{compare_models, ComparisonReport};
use crate::config::ExperimentConfig;
use crate::data::{SequenceSumTask, SineTask};
use crate::error::Result;
use crate::models::{LiquidSequenceModel, ModelSpec, SineRegressor, WiringKind};
use crate::report::{write_history_csv, write_json, write_predictions_csv, write_wiring_dot};
use crate::training::{evaluate, predict_first, Trainer, TrainingHistory};
use crate::wirings::{AutoNCP, Wiring};

/// CPU backend with autodiff, used by the CLI and the demos
pub type TrainBackend = Autodiff<NdArray<f32>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub experiment: String,
    pub num_params: usize,
    /// Loss before any update
    pub initial_loss: f32,
    pub train_loss: f32,
    pub test_loss: Option<f32>,
    pub history: TrainingHistory,
}

/// CfC regression of the sine target from `[sin, cos]` inputs.
pub fn run_sine<B: AutodiffBackend>(
    config: &ExperimentConfig,
    output_dir: &Path,
    device: &B::Device,
) -> Result<RunSummary> {
    B::seed(config.training.seed);
    let data = SineTask::generate(config.data.sequence_length, config.data.seed)?;

    let sine = &config.sine;
    let model = if sine.wired {
        let mut wiring =
            AutoNCP::new(sine.units, sine.motor_neurons, sine.sparsity_level, sine.wiring_seed)?;
        SineRegressor::<B>::wired(SineTask::INPUT_DIM, &mut wiring, sine.mode, device)?
    } else {
        SineRegressor::<B>::new(SineTask::INPUT_DIM, sine.units, sine.mode, device)?
    };
    let num_params = model.num_params();
    let initial_loss = evaluate(&model, &data, device);
    info!("Sine model: {} parameters, initial loss {:.6}", num_params, initial_loss);

    let mut trainer = Trainer::new(config.training.clone())?;
    let (model, history) = trainer.fit(model, &data, None, device)?;
    trainer.profiler().log_summary("sine");

    let predictions = predict_first(&model, &data, device)?;
    write_predictions_csv(output_dir.join("predictions.csv"), &data.first_targets(), &predictions)?;
    write_history_csv(output_dir.join("history.csv"), &history)?;

    let summary = RunSummary {
        experiment: "sine".to_string(),
        num_params,
        initial_loss,
        train_loss: evaluate(&model, &data, device),
        test_loss: None,
        history,
    };
    write_json(output_dir.join("summary.json"), &summary)?;
    Ok(summary)
}

/// Trains every model of `config.models` on the sine task.
pub fn run_comparison<B: AutodiffBackend>(
    config: &ExperimentConfig,
    output_dir: &Path,
    device: &B::Device,
) -> Result<ComparisonReport> {
    let data = SineTask::generate(config.data.sequence_length, config.data.seed)?;
    let report = compare_models::<B>(&config.models, &data, &config.training, device)?;

    for result in &report.results {
        write_history_csv(output_dir.join(format!("history_{}.csv", result.name)), &result.history)?;
    }
    write_json(output_dir.join("comparison.json"), &report)?;
    Ok(report)
}

/// Backbone CfC predicting the per-feature sum of random sequences.
pub fn run_sequence_sum<B: AutodiffBackend>(
    config: &ExperimentConfig,
    output_dir: &Path,
    device: &B::Device,
) -> Result<RunSummary> {
    B::seed(config.training.seed);
    let data = &config.data;
    let train = SequenceSumTask::generate(data.train_samples, data.steps, data.features, data.seed)?;
    let test = SequenceSumTask::generate(
        data.test_samples,
        data.steps,
        data.features,
        data.seed.wrapping_add(1),
    )?;
    info!(
        "Sequence-sum data: train {:?}, test {:?}, time deltas {:?}",
        train.inputs.shape(),
        test.inputs.shape(),
        train.time_deltas.shape()
    );

    let liquid = &config.liquid;
    let model = LiquidSequenceModel::<B>::new(
        data.features,
        liquid.hidden_units,
        data.features,
        &liquid.cfc_options(),
        device,
    )?;
    let num_params = model.num_params();
    let initial_loss = evaluate(&model, &train, device);
    info!(
        "Liquid model: {} parameters, untrained train MSE {:.4}, test MSE {:.4}",
        num_params,
        initial_loss,
        evaluate(&model, &test, device)
    );

    let mut training = config.training.clone();
    training.batch_size = training.batch_size.or(Some(liquid.batch_size));
    let mut trainer = Trainer::new(training)?;
    let (model, history) = trainer.fit(model, &train, Some(&test), device)?;
    trainer.profiler().log_summary("sequence-sum");

    let train_loss = evaluate(&model, &train, device);
    let test_loss = evaluate(&model, &test, device);
    info!("Training MSE: {:.4}, Test MSE: {:.4}", train_loss, test_loss);

    let predictions = predict_first(&model, &test, device)?;
    write_predictions_csv(output_dir.join("predictions.csv"), &test.first_targets(), &predictions)?;
    write_history_csv(output_dir.join("history.csv"), &history)?;

    let summary = RunSummary {
        experiment: "sequence-sum".to_string(),
        num_params,
        initial_loss,
        train_loss,
        test_loss: Some(test_loss),
        history,
    };
    write_json(output_dir.join("summary.json"), &summary)?;
    Ok(summary)
}

/// Wiring to export with [`export_wiring`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WiringExport {
    pub kind: WiringKind,
    pub units: usize,
    pub motor_neurons: Option<usize>,
    pub input_dim: usize,
    pub sparsity_level: f64,
    pub seed: u64,
}

/// Builds the wiring and writes `wiring.dot` and `wiring.json`.
pub fn export_wiring(export: &WiringExport, output_dir: &Path) -> Result<Box<dyn Wiring>> {
    let spec = ModelSpec {
        wiring: export.kind,
        motor_neurons: export.motor_neurons,
        sparsity_level: export.sparsity_level,
        wiring_seed: export.seed,
        ..ModelSpec::cfc("wiring", export.units, Default::default())
    };
    let mut wiring = spec.build_wiring()?;
    wiring.build(export.input_dim)?;

    write_wiring_dot(output_dir.join("wiring.dot"), wiring.as_ref())?;
    write_json(output_dir.join("wiring.json"), &wiring.config())?;
    Ok(wiring)
}
