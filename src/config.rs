//! Experiment configuration, loaded from TOML
//!
//! Every section has defaults, so an empty file (or no file) yields the
//! settings the experiments were tuned with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::cells::{CfcMode, CfcOptions};
use crate::error::{NcpsError, Result};
use crate::models::ModelSpec;

/// Optimizer and training-loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub beta_1: f32,
    pub beta_2: f32,
    pub epsilon: f32,
    /// Gradient norm clipping threshold; no clipping when absent
    pub max_grad_norm: Option<f32>,
    /// Epochs without improvement before stopping; never stops early when absent
    pub patience: Option<usize>,
    pub log_every: usize,
    pub eval_every: usize,
    /// Sequences per optimizer step; the whole dataset when absent
    pub batch_size: Option<usize>,
    pub seed: u64,
    pub track_memory: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
            max_grad_norm: Some(0.1),
            patience: Some(10),
            log_every: 10,
            eval_every: 50,
            batch_size: None,
            seed: 42,
            track_memory: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate >= 0.0) {
            return Err(NcpsError::config(format!(
                "learning_rate must be a non-negative number, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.beta_1) || !(0.0..1.0).contains(&self.beta_2) {
            return Err(NcpsError::config("Adam betas must be in [0, 1)"));
        }
        if self.epsilon <= 0.0 {
            return Err(NcpsError::config("epsilon must be positive"));
        }
        if matches!(self.max_grad_norm, Some(norm) if norm <= 0.0) {
            return Err(NcpsError::config("max_grad_norm must be positive"));
        }
        if self.patience == Some(0) {
            return Err(NcpsError::config("patience must be at least 1"));
        }
        if self.log_every == 0 || self.eval_every == 0 {
            return Err(NcpsError::config("log_every and eval_every must be positive"));
        }
        if self.batch_size == Some(0) {
            return Err(NcpsError::config("batch_size must be positive"));
        }
        Ok(())
    }
}

/// Sizes and seed of the synthetic datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Length of the sine sequence
    pub sequence_length: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Steps per sequence-sum sample
    pub steps: usize,
    /// Features per sequence-sum step
    pub features: usize,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sequence_length: 1000,
            train_samples: 1000,
            test_samples: 100,
            steps: 20,
            features: 16,
            seed: 42,
        }
    }
}

/// Model of the `sine` experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SineConfig {
    pub units: usize,
    pub mode: CfcMode,
    /// Wire the CfC with an AutoNCP circuit instead of a dense cell
    pub wired: bool,
    pub motor_neurons: usize,
    pub sparsity_level: f64,
    pub wiring_seed: u64,
}

impl Default for SineConfig {
    fn default() -> Self {
        Self {
            units: 16,
            mode: CfcMode::Default,
            wired: false,
            motor_neurons: 4,
            sparsity_level: 0.5,
            wiring_seed: 22222,
        }
    }
}

/// Model of the `sequence-sum` experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidConfig {
    pub hidden_units: usize,
    pub backbone_units: usize,
    pub backbone_layers: usize,
    pub backbone_dropout: f64,
    pub mode: CfcMode,
    pub activation: Activation,
    pub batch_size: usize,
}

impl Default for LiquidConfig {
    fn default() -> Self {
        Self {
            hidden_units: 32,
            backbone_units: 64,
            backbone_layers: 2,
            backbone_dropout: 0.1,
            mode: CfcMode::Pure,
            activation: Activation::Tanh,
            batch_size: 32,
        }
    }
}

impl LiquidConfig {
    pub fn cfc_options(&self) -> CfcOptions {
        CfcOptions::default()
            .with_mode(self.mode)
            .with_activation(self.activation)
            .with_backbone(self.backbone_units, self.backbone_layers, self.backbone_dropout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub training: TrainingConfig,
    pub data: DataConfig,
    pub sine: SineConfig,
    pub liquid: LiquidConfig,
    /// Models trained by the `compare` experiment
    pub models: Vec<ModelSpec>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            data: DataConfig::default(),
            sine: SineConfig::default(),
            liquid: LiquidConfig::default(),
            models: ModelSpec::default_comparison(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;

        let data = &self.data;
        if data.sequence_length == 0 || data.steps == 0 || data.features == 0 {
            return Err(NcpsError::config("data sizes must be positive"));
        }
        if data.train_samples == 0 || data.test_samples == 0 {
            return Err(NcpsError::config("train_samples and test_samples must be positive"));
        }
        if self.sine.units == 0 {
            return Err(NcpsError::config("sine.units must be positive"));
        }
        if self.liquid.hidden_units == 0 || self.liquid.batch_size == 0 {
            return Err(NcpsError::config("liquid sizes must be positive"));
        }
        self.liquid.cfc_options().validate()?;

        if self.models.is_empty() {
            return Err(NcpsError::config("at least one model is required"));
        }
        let mut names = std::collections::HashSet::new();
        for spec in &self.models {
            spec.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(NcpsError::config(format!("duplicate model name '{}'", spec.name)));
            }
        }
        Ok(())
    }
}
