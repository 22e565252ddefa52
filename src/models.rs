//! Sequence models used by the experiments
//!
//! Every model maps `inputs [batch, seq, features]` and `time_deltas
//! [batch, seq]` to `[batch, seq, out]`, or `[batch, 1, out]` when it predicts
//! only the final value.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::cells::{CfcMode, CfcOptions};
use crate::error::{NcpsError, Result};
use crate::rnn::{CfC, LTC};
use crate::wirings::{AutoNCP, FullyConnected, Random, Wiring};

/// A recurrent model driven by per-step elapsed times.
pub trait SequenceModel<B: Backend> {
    fn forward(&self, inputs: Tensor<B, 3>, time_deltas: Tensor<B, 2>) -> Tensor<B, 3>;
}

/// Recurrent layer used by a [`RecurrentModel`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Dense CfC
    #[default]
    Cfc,
    /// CfC following the layers of a wiring
    WiredCfc,
    Ltc,
}

impl CellKind {
    fn code(self) -> u8 {
        match self {
            CellKind::Cfc => 0,
            CellKind::WiredCfc => 1,
            CellKind::Ltc => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => CellKind::WiredCfc,
            2 => CellKind::Ltc,
            _ => CellKind::Cfc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiringKind {
    #[default]
    FullyConnected,
    AutoNcp,
    Random,
}

fn default_sparsity() -> f64 {
    0.5
}

fn default_backbone_units() -> usize {
    128
}

fn default_wiring_seed() -> u64 {
    22222
}

/// Serializable description of a [`RecurrentModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default)]
    pub cell: CellKind,
    pub units: usize,
    #[serde(default)]
    pub mode: CfcMode,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub wiring: WiringKind,
    /// Motor neurons of the wiring; all units when absent
    #[serde(default)]
    pub motor_neurons: Option<usize>,
    #[serde(default = "default_sparsity")]
    pub sparsity_level: f64,
    #[serde(default = "default_backbone_units")]
    pub backbone_units: usize,
    #[serde(default)]
    pub backbone_layers: usize,
    #[serde(default)]
    pub backbone_dropout: f64,
    #[serde(default)]
    pub ode_unfolds: Option<usize>,
    #[serde(default = "default_wiring_seed")]
    pub wiring_seed: u64,
}

impl ModelSpec {
    /// Dense CfC with `units` hidden neurons
    pub fn cfc(name: impl Into<String>, units: usize, mode: CfcMode) -> Self {
        Self {
            name: name.into(),
            cell: CellKind::Cfc,
            units,
            mode,
            activation: Activation::default(),
            wiring: WiringKind::FullyConnected,
            motor_neurons: None,
            sparsity_level: default_sparsity(),
            backbone_units: default_backbone_units(),
            backbone_layers: 0,
            backbone_dropout: 0.0,
            ode_unfolds: None,
            wiring_seed: default_wiring_seed(),
        }
    }

    /// CfC wired by an AutoNCP circuit
    pub fn wired_cfc(name: impl Into<String>, units: usize, motor_neurons: usize, sparsity_level: f64) -> Self {
        Self {
            cell: CellKind::WiredCfc,
            wiring: WiringKind::AutoNcp,
            motor_neurons: Some(motor_neurons),
            sparsity_level,
            ..Self::cfc(name, units, CfcMode::Default)
        }
    }

    pub fn ltc(name: impl Into<String>, units: usize, wiring: WiringKind, motor_neurons: Option<usize>) -> Self {
        Self {
            cell: CellKind::Ltc,
            wiring,
            motor_neurons,
            ..Self::cfc(name, units, CfcMode::Default)
        }
    }

    /// The cell line-up trained by the `compare` experiment
    pub fn default_comparison() -> Vec<Self> {
        vec![
            Self::cfc("cfc_default", 8, CfcMode::Default),
            Self::cfc("cfc_pure", 8, CfcMode::Pure),
            Self::cfc("cfc_no_gate", 8, CfcMode::NoGate),
            Self::wired_cfc("cfc_auto_ncp", 8, 1, 0.5),
            Self::ltc("ltc_fully_connected", 8, WiringKind::FullyConnected, Some(1)),
            Self::ltc("ltc_auto_ncp", 8, WiringKind::AutoNcp, Some(1)),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NcpsError::config("model name must not be empty"));
        }
        // Names become part of output file names
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(NcpsError::config(format!(
                "model name '{}' may only contain letters, digits, '_' and '-'",
                self.name
            )));
        }
        if self.units == 0 {
            return Err(NcpsError::config(format!("model '{}' needs at least one unit", self.name)));
        }
        if self.cell == CellKind::Cfc {
            self.cfc_options().validate()?;
        }
        Ok(())
    }

    pub fn cfc_options(&self) -> CfcOptions {
        CfcOptions::default()
            .with_mode(self.mode)
            .with_activation(self.activation)
            .with_backbone(self.backbone_units, self.backbone_layers, self.backbone_dropout)
    }

    /// The unbuilt wiring this spec describes
    pub fn build_wiring(&self) -> Result<Box<dyn Wiring>> {
        let wiring: Box<dyn Wiring> = match self.wiring {
            WiringKind::FullyConnected => Box::new(FullyConnected::new(
                self.units,
                self.motor_neurons,
                self.wiring_seed,
                true,
            )?),
            WiringKind::AutoNcp => Box::new(AutoNCP::new(
                self.units,
                self.motor_neurons.unwrap_or(1),
                self.sparsity_level,
                self.wiring_seed,
            )?),
            WiringKind::Random => Box::new(Random::new(
                self.units,
                self.motor_neurons,
                self.sparsity_level,
                self.wiring_seed,
            )?),
        };
        Ok(wiring)
    }
}

/// CfC regressor for the sine task: recurrent layer plus a per-step linear
/// readout.
#[derive(Module, Debug)]
pub struct SineRegressor<B: Backend> {
    rnn: CfC<B>,
    readout: Linear<B>,
}

impl<B: Backend> SineRegressor<B> {
    pub fn new(input_dim: usize, units: usize, mode: CfcMode, device: &B::Device) -> Result<Self> {
        let options = CfcOptions::default().with_mode(mode);
        let rnn = CfC::with_options(input_dim, units, &options, device)?;
        Ok(Self::from_rnn(rnn, device))
    }

    /// Regressor over a wired CfC; the readout reads the motor neurons.
    pub fn wired(
        input_dim: usize,
        wiring: &mut dyn Wiring,
        mode: CfcMode,
        device: &B::Device,
    ) -> Result<Self> {
        let rnn = CfC::with_wiring(input_dim, wiring, mode, device)?;
        Ok(Self::from_rnn(rnn, device))
    }

    fn from_rnn(rnn: CfC<B>, device: &B::Device) -> Self {
        let readout = LinearConfig::new(rnn.output_size(), 1).init(device);
        Self { rnn, readout }
    }

    pub fn rnn(&self) -> &CfC<B> {
        &self.rnn
    }
}

impl<B: Backend> SequenceModel<B> for SineRegressor<B> {
    fn forward(&self, inputs: Tensor<B, 3>, time_deltas: Tensor<B, 2>) -> Tensor<B, 3> {
        let (sequence, _) = self.rnn.forward(inputs, None, Some(time_deltas));
        self.readout.forward(sequence)
    }
}

/// Recurrent layer chosen by a [`ModelSpec`], followed by a linear readout.
#[derive(Module, Debug)]
pub struct RecurrentModel<B: Backend> {
    cfc: Option<CfC<B>>,
    ltc: Option<LTC<B>>,
    readout: Linear<B>,
    /// See [`CellKind`]
    #[module(skip)]
    kind: u8,
}

impl<B: Backend> RecurrentModel<B> {
    /// Builds the model of `spec` for `input_dim` features and `output_dim`
    /// targets. Without `return_sequences` only the last step is predicted.
    pub fn from_spec(
        spec: &ModelSpec,
        input_dim: usize,
        output_dim: usize,
        return_sequences: bool,
        device: &B::Device,
    ) -> Result<Self> {
        spec.validate()?;
        let (cfc, ltc, rnn_output) = match spec.cell {
            CellKind::Cfc => {
                let rnn = CfC::with_options(input_dim, spec.units, &spec.cfc_options(), device)?
                    .with_return_sequences(return_sequences);
                let size = rnn.output_size();
                (Some(rnn), None, size)
            }
            CellKind::WiredCfc => {
                let mut wiring = spec.build_wiring()?;
                let rnn = CfC::with_wiring(input_dim, wiring.as_mut(), spec.mode, device)?
                    .with_return_sequences(return_sequences);
                let size = rnn.output_size();
                (Some(rnn), None, size)
            }
            CellKind::Ltc => {
                let mut wiring = spec.build_wiring()?;
                let mut rnn = LTC::new(input_dim, wiring.as_mut(), device)?
                    .with_return_sequences(return_sequences);
                if let Some(unfolds) = spec.ode_unfolds {
                    rnn = rnn.with_ode_unfolds(unfolds);
                }
                let size = rnn.motor_size();
                (None, Some(rnn), size)
            }
        };

        Ok(Self {
            cfc,
            ltc,
            readout: LinearConfig::new(rnn_output, output_dim).init(device),
            kind: spec.cell.code(),
        })
    }

    pub fn kind(&self) -> CellKind {
        CellKind::from_code(self.kind)
    }
}

impl<B: Backend> SequenceModel<B> for RecurrentModel<B> {
    fn forward(&self, inputs: Tensor<B, 3>, time_deltas: Tensor<B, 2>) -> Tensor<B, 3> {
        let sequence = match (&self.cfc, &self.ltc) {
            (Some(cfc), _) => cfc.forward(inputs, None, Some(time_deltas)).0,
            (None, Some(ltc)) => ltc.forward(inputs, None, Some(time_deltas)).0,
            (None, None) => unreachable!("recurrent model without a layer"),
        };
        self.readout.forward(sequence)
    }
}

/// Backbone CfC that reads a whole sequence and predicts one vector from the
/// last step.
#[derive(Module, Debug)]
pub struct LiquidSequenceModel<B: Backend> {
    rnn: CfC<B>,
    readout: Linear<B>,
}

impl<B: Backend> LiquidSequenceModel<B> {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        options: &CfcOptions,
        device: &B::Device,
    ) -> Result<Self> {
        let rnn = CfC::with_options(input_dim, hidden_dim, options, device)?
            .with_return_sequences(false);
        let readout = LinearConfig::new(hidden_dim, output_dim).init(device);
        Ok(Self { rnn, readout })
    }

    pub fn rnn(&self) -> &CfC<B> {
        &self.rnn
    }
}

impl<B: Backend> SequenceModel<B> for LiquidSequenceModel<B> {
    fn forward(&self, inputs: Tensor<B, 3>, time_deltas: Tensor<B, 2>) -> Tensor<B, 3> {
        let (last, _) = self.rnn.forward(inputs, None, Some(time_deltas));
        self.readout.forward(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn inputs(batch: usize, seq: usize, features: usize) -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 2>) {
        let device = Default::default();
        (
            Tensor::ones([batch, seq, features], &device),
            Tensor::ones([batch, seq], &device),
        )
    }

    #[test]
    fn test_sine_regressor_shapes() {
        let device = Default::default();
        let model = SineRegressor::<TestBackend>::new(2, 8, CfcMode::Default, &device).unwrap();
        let (x, t) = inputs(1, 12, 2);
        assert_eq!(model.forward(x, t).dims(), [1, 12, 1]);
    }

    #[test]
    fn test_wired_sine_regressor_reads_motor_neurons() {
        let device = Default::default();
        let mut wiring = AutoNCP::new(12, 3, 0.5, 1).unwrap();
        let model =
            SineRegressor::<TestBackend>::wired(2, &mut wiring, CfcMode::NoGate, &device).unwrap();
        assert_eq!(model.rnn().output_size(), 3);
        let (x, t) = inputs(2, 5, 2);
        assert_eq!(model.forward(x, t).dims(), [2, 5, 1]);
    }

    #[test]
    fn test_every_comparison_spec_builds() {
        let device = Default::default();
        for spec in ModelSpec::default_comparison() {
            let model = RecurrentModel::<TestBackend>::from_spec(&spec, 2, 1, true, &device).unwrap();
            assert_eq!(model.kind(), spec.cell);
            assert!(model.num_params() > 0, "{} has no parameters", spec.name);
            let (x, t) = inputs(1, 4, 2);
            assert_eq!(model.forward(x, t).dims(), [1, 4, 1], "{}", spec.name);
        }
    }

    #[test]
    fn test_recurrent_model_last_step_only() {
        let device = Default::default();
        let spec = ModelSpec::ltc("ltc", 6, WiringKind::Random, Some(2));
        let model = RecurrentModel::<TestBackend>::from_spec(&spec, 3, 4, false, &device).unwrap();
        let (x, t) = inputs(2, 5, 3);
        assert_eq!(model.forward(x, t).dims(), [2, 1, 4]);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let device = Default::default();
        let mut spec = ModelSpec::cfc("bad", 0, CfcMode::Pure);
        assert!(RecurrentModel::<TestBackend>::from_spec(&spec, 2, 1, true, &device).is_err());

        spec.units = 4;
        spec.backbone_layers = 1;
        spec.backbone_dropout = 1.5;
        assert!(spec.validate().is_err());

        let wired = ModelSpec::wired_cfc("tiny", 3, 1, 0.5);
        assert!(RecurrentModel::<TestBackend>::from_spec(&wired, 2, 1, true, &device).is_err());
    }

    #[test]
    fn test_model_names_stay_inside_output_dir() {
        for name in ["../escape", "nested/model", "back\\slash", "with space", ".."] {
            let spec = ModelSpec::cfc(name, 4, CfcMode::Default);
            assert!(spec.validate().is_err(), "accepted '{}'", name);
        }
        for spec in ModelSpec::default_comparison() {
            assert!(spec.validate().is_ok(), "rejected '{}'", spec.name);
        }
    }

    #[test]
    fn test_model_spec_from_toml() {
        let spec: ModelSpec = toml::from_str(
            r#"
            name = "ncp"
            cell = "wired_cfc"
            units = 16
            wiring = "auto_ncp"
            motor_neurons = 2
            mode = "pure"
            "#,
        )
        .unwrap();
        assert_eq!(spec.cell, CellKind::WiredCfc);
        assert_eq!(spec.mode, CfcMode::Pure);
        assert_eq!(spec.sparsity_level, 0.5);
        assert_eq!(spec.backbone_layers, 0);
    }

    #[test]
    fn test_liquid_model_predicts_final_vector() {
        let device = Default::default();
        let options = CfcOptions::default()
            .with_mode(CfcMode::Pure)
            .with_activation(Activation::Tanh)
            .with_backbone(16, 2, 0.1);
        let model = LiquidSequenceModel::<TestBackend>::new(4, 8, 4, &options, &device).unwrap();
        let (x, t) = inputs(3, 6, 4);
        assert_eq!(model.forward(x, t).dims(), [3, 1, 4]);
    }
}
