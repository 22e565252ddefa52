//! Training loop
//!
//! Adam with optional global gradient-norm clipping, NaN detection,
//! patience-based early stopping and periodic evaluation. Gradients and
//! parameter updates are left to `burn`.

use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::data::SequenceBatch;
use crate::error::{NcpsError, Result};
use crate::models::SequenceModel;
use crate::profiling::{ProfileSummary, Profiler, BACKWARD, EVAL, FORWARD, STEP};

/// Mean squared error over every element
pub fn mse_loss<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    pred.sub(target).powf_scalar(2.0).mean()
}

/// Why a training run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    EarlyStopped { epoch: usize },
    /// The loss became NaN or infinite
    Diverged { epoch: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub epoch: usize,
    pub loss: f32,
}

/// Per-epoch record of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Mean training loss of every completed epoch
    pub losses: Vec<f32>,
    pub eval_losses: Vec<EvalRecord>,
    pub best_loss: Option<f32>,
    pub best_epoch: Option<usize>,
    pub stop_reason: StopReason,
    pub profile: Option<ProfileSummary>,
}

impl TrainingHistory {
    fn new() -> Self {
        Self {
            losses: Vec::new(),
            eval_losses: Vec::new(),
            best_loss: None,
            best_epoch: None,
            stop_reason: StopReason::Completed,
            profile: None,
        }
    }

    pub fn epochs_run(&self) -> usize {
        self.losses.len()
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.losses.last().copied()
    }

    pub fn diverged(&self) -> bool {
        matches!(self.stop_reason, StopReason::Diverged { .. })
    }

    /// Evaluation loss recorded at `epoch`, if any
    pub fn eval_loss_at(&self, epoch: usize) -> Option<f32> {
        self.eval_losses
            .iter()
            .find(|record| record.epoch == epoch)
            .map(|record| record.loss)
    }
}

/// Loss of `model` on `batch` without any parameter update
pub fn evaluate<B: Backend, M: SequenceModel<B>>(
    model: &M,
    batch: &SequenceBatch,
    device: &B::Device,
) -> f32 {
    let (inputs, time_deltas, targets) = batch.to_tensors::<B>(device);
    let pred = model.forward(inputs, time_deltas);
    mse_loss(pred, targets).into_scalar().elem::<f32>()
}

/// Model output for the first sequence of `batch`, flattened over time and
/// features
pub fn predict_first<B: Backend, M: SequenceModel<B>>(
    model: &M,
    batch: &SequenceBatch,
    device: &B::Device,
) -> Result<Vec<f32>> {
    let first = batch.slice(0, 1)?;
    let (inputs, time_deltas, _) = first.to_tensors::<B>(device);
    model
        .forward(inputs, time_deltas)
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| NcpsError::shape(format!("cannot read predictions: {:?}", e)))
}

struct GradNormVisitor<'a> {
    grads: &'a GradientsParams,
    sum_squares: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradNormVisitor<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_squares += grad.powf_scalar(2.0).sum().into_scalar().elem::<f32>();
        }
    }
}

struct GradScaler<'a> {
    grads: &'a mut GradientsParams,
    scale: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScaler<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm over the gradients of every parameter of `model`
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = GradNormVisitor {
        grads,
        sum_squares: 0.0,
    };
    model.visit(&mut visitor);
    visitor.sum_squares.sqrt()
}

/// Rescales all gradients together when their global norm exceeds
/// `max_norm`, by `max_norm / (norm + 1e-6)`.
///
/// Returns the norm measured before clipping.
pub fn clip_grad_norm<B, M>(model: &M, grads: &mut GradientsParams, max_norm: f32) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, grads);
    if norm > max_norm {
        let mut scaler = GradScaler {
            grads,
            scale: max_norm / (norm + 1e-6),
        };
        model.visit(&mut scaler);
    }
    norm
}

pub struct Trainer {
    config: TrainingConfig,
    profiler: Profiler,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let profiler = Profiler::new(config.track_memory);
        Ok(Self { config, profiler })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `model` on `train`, evaluating on `eval` (or `train` when
    /// absent) every `eval_every` epochs.
    ///
    /// Returns the trained model even when the run diverged.
    pub fn fit<B, M>(
        &mut self,
        model: M,
        train: &SequenceBatch,
        eval: Option<&SequenceBatch>,
        device: &B::Device,
    ) -> Result<(M, TrainingHistory)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + SequenceModel<B>,
    {
        let batches = match self.config.batch_size {
            Some(size) => train.batches(size)?,
            None => vec![train.clone()],
        };
        let eval = eval.unwrap_or(train);

        info!(
            "Training {} parameters for {} epochs on {} sequences ({} batches)",
            model.num_params(),
            self.config.epochs,
            train.len(),
            batches.len()
        );

        let mut optimizer = AdamConfig::new()
            .with_beta_1(self.config.beta_1)
            .with_beta_2(self.config.beta_2)
            .with_epsilon(self.config.epsilon)
            .init::<B, M>();

        let learning_rate = self.config.learning_rate;
        let max_grad_norm = self.config.max_grad_norm;
        let mut model = model;
        let mut history = TrainingHistory::new();
        let mut patience_counter = 0;

        'epochs: for epoch in 0..self.config.epochs {
            let mut loss_sum = 0.0;

            for batch in &batches {
                let (inputs, time_deltas, targets) = batch.to_tensors::<B>(device);

                let loss = self.profiler.time(FORWARD, || {
                    mse_loss(model.forward(inputs, time_deltas), targets)
                });
                let loss_value = loss.clone().into_scalar().elem::<f32>();

                if !loss_value.is_finite() {
                    warn!("Training failed at epoch {} with loss {}", epoch, loss_value);
                    history.stop_reason = StopReason::Diverged { epoch };
                    break 'epochs;
                }

                let mut grads = self.profiler.time(BACKWARD, || {
                    GradientsParams::from_grads(loss.backward(), &model)
                });
                if let Some(max_norm) = max_grad_norm {
                    let norm = clip_grad_norm::<B, M>(&model, &mut grads, max_norm);
                    if norm > max_norm {
                        debug!("Gradient norm {:.4} clipped to {}", norm, max_norm);
                    }
                }
                model = self.profiler.time(STEP, || {
                    optimizer.step(learning_rate, model, grads)
                });
                loss_sum += loss_value;
            }

            let epoch_loss = loss_sum / batches.len() as f32;
            history.losses.push(epoch_loss);

            if history.best_loss.map_or(true, |best| epoch_loss < best) {
                history.best_loss = Some(epoch_loss);
                history.best_epoch = Some(epoch);
                patience_counter = 0;
            } else {
                patience_counter += 1;
            }

            if let Some(patience) = self.config.patience {
                if patience_counter >= patience {
                    info!("Early stopping triggered at epoch {}", epoch);
                    history.stop_reason = StopReason::EarlyStopped { epoch };
                    break;
                }
            }

            if (epoch + 1) % self.config.log_every == 0 {
                info!("Epoch {}, Loss: {:.6}", epoch + 1, epoch_loss);
            } else {
                debug!("Epoch {}, Loss: {:.6}", epoch + 1, epoch_loss);
            }

            if (epoch + 1) % self.config.eval_every == 0 {
                let eval_loss = self.profiler.time(EVAL, || evaluate(&model, eval, device));
                info!("Evaluation Loss: {:.6}", eval_loss);
                history.eval_losses.push(EvalRecord {
                    epoch,
                    loss: eval_loss,
                });
                self.profiler.sample_memory();
            }
        }

        self.profiler.sample_memory();
        history.profile = Some(self.profiler.summary());

        match history.best_loss {
            Some(best) => info!(
                "Training finished ({:?}). Best loss {:.6} at epoch {}",
                history.stop_reason,
                best,
                history.best_epoch.unwrap_or(0)
            ),
            None => info!("Training finished ({:?})", history.stop_reason),
        }

        Ok((model, history))
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}
