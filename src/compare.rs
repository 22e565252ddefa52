//! Train several models on the same data and rank them
//!
//! Each model gets its own optimizer and profiler. A model that diverges is
//! reported, not fatal to the run.

use std::fmt;

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::data::SequenceBatch;
use crate::error::Result;
use crate::models::{CellKind, ModelSpec, RecurrentModel};
use crate::training::{evaluate, StopReason, Trainer, TrainingHistory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub name: String,
    pub cell: CellKind,
    pub num_params: usize,
    /// Loss of the trained model on the whole dataset; absent when not finite
    pub final_loss: Option<f32>,
    pub stop_reason: StopReason,
    pub history: TrainingHistory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub results: Vec<ModelResult>,
}

impl ComparisonReport {
    /// Sorts by final loss, models without one last.
    pub fn sort(&mut self) {
        self.results.sort_by(|a, b| match (a.final_loss, b.final_loss) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    pub fn best(&self) -> Option<&ModelResult> {
        self.results
            .iter()
            .filter_map(|r| r.final_loss.map(|loss| (loss, r)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, r)| r)
    }

    pub fn get(&self, name: &str) -> Option<&ModelResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

fn describe(reason: &StopReason) -> String {
    match reason {
        StopReason::Completed => "completed".to_string(),
        StopReason::EarlyStopped { epoch } => format!("early stop @{}", epoch),
        StopReason::Diverged { epoch } => format!("diverged @{}", epoch),
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<24} {:>10} {:>8} {:>12}  {}",
            "model", "params", "epochs", "final loss", "stop"
        )?;
        for result in &self.results {
            let loss = match result.final_loss {
                Some(loss) => format!("{:.6}", loss),
                None => "n/a".to_string(),
            };
            writeln!(
                f,
                "{:<24} {:>10} {:>8} {:>12}  {}",
                result.name,
                result.num_params,
                result.history.epochs_run(),
                loss,
                describe(&result.stop_reason)
            )?;
        }
        Ok(())
    }
}

/// Trains every spec in turn on `data`.
///
/// Specs that cannot be built are errors; training failures are recorded in
/// the report.
pub fn compare_models<B: AutodiffBackend>(
    specs: &[ModelSpec],
    data: &SequenceBatch,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<ComparisonReport> {
    let mut report = ComparisonReport::default();
    let return_sequences = !data.has_final_targets();

    for spec in specs {
        info!("Training {}", spec.name);
        B::seed(config.seed);
        let model = RecurrentModel::<B>::from_spec(
            spec,
            data.input_dim(),
            data.output_dim(),
            return_sequences,
            device,
        )?;
        let num_params = model.num_params();

        let mut trainer = Trainer::new(config.clone())?;
        let (model, history) = trainer.fit(model, data, None, device)?;
        trainer.profiler().log_summary(&spec.name);

        let final_loss = Some(evaluate(&model, data, device)).filter(|loss| loss.is_finite());
        if final_loss.is_none() {
            warn!("{} has no finite final loss", spec.name);
        }

        report.results.push(ModelResult {
            name: spec.name.clone(),
            cell: spec.cell,
            num_params,
            final_loss,
            stop_reason: history.stop_reason,
            history,
        });
    }

    report.sort();
    info!("Training complete. Final losses:\n{}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, final_loss: Option<f32>) -> ModelResult {
        ModelResult {
            name: name.to_string(),
            cell: CellKind::Cfc,
            num_params: 10,
            final_loss,
            stop_reason: StopReason::Completed,
            history: TrainingHistory {
                losses: vec![1.0],
                eval_losses: vec![],
                best_loss: Some(1.0),
                best_epoch: Some(0),
                stop_reason: StopReason::Completed,
                profile: None,
            },
        }
    }

    #[test]
    fn test_sort_puts_missing_losses_last() {
        let mut report = ComparisonReport {
            results: vec![
                result("nan", None),
                result("b", Some(0.2)),
                result("a", Some(0.1)),
            ],
        };
        report.sort();
        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "nan"]);
        assert_eq!(report.best().unwrap().name, "a");
        assert!(report.get("nan").unwrap().final_loss.is_none());
    }

    #[test]
    fn test_table_lists_every_model() {
        let report = ComparisonReport {
            results: vec![result("cfc", Some(0.5)), result("ltc", None)],
        };
        let table = report.to_string();
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("0.500000"));
        assert!(table.contains("n/a"));
    }
}
