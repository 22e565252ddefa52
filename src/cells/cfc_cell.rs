//! Closed-form Continuous-time (CfC) Cell Implementation
//!
//! The CfC cell approximates the LTC dynamics with a closed-form solution, so no
//! ODE solver is unrolled per step.
//!
//! Three modes are supported:
//! - **Default**: Gated interpolation between two feedforward heads
//! - **Pure**: Direct closed-form solution without gating
//! - **NoGate**: Gate added to the first head instead of interpolating

use burn::module::{Module, Param};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{NcpsError, Result};

/// CfC cell operating modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfcMode {
    /// h = tanh(ff1) * (1 - σ) + tanh(ff2) * σ
    #[default]
    Default,
    /// h = -A * exp(-t * (|w_τ| + |ff1|)) * ff1 + A
    Pure,
    /// h = tanh(ff1) + tanh(ff2) * σ
    NoGate,
}

impl CfcMode {
    fn code(self) -> u8 {
        match self {
            CfcMode::Default => 0,
            CfcMode::Pure => 1,
            CfcMode::NoGate => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => CfcMode::Pure,
            2 => CfcMode::NoGate,
            _ => CfcMode::Default,
        }
    }
}

impl std::str::FromStr for CfcMode {
    type Err = NcpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(CfcMode::Default),
            "pure" => Ok(CfcMode::Pure),
            "no_gate" => Ok(CfcMode::NoGate),
            other => Err(NcpsError::config(format!(
                "unknown CfC mode `{}` (expected default, pure or no_gate)",
                other
            ))),
        }
    }
}

/// Construction options for a [`CfCCell`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfcOptions {
    pub mode: CfcMode,
    pub activation: Activation,
    pub backbone_units: usize,
    /// Zero disables the backbone: the heads read `[input, hidden]` directly.
    pub backbone_layers: usize,
    pub backbone_dropout: f64,
}

impl Default for CfcOptions {
    fn default() -> Self {
        Self {
            mode: CfcMode::Default,
            activation: Activation::LecunTanh,
            backbone_units: 128,
            backbone_layers: 0,
            backbone_dropout: 0.0,
        }
    }
}

impl CfcOptions {
    pub fn with_mode(mut self, mode: CfcMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_backbone(mut self, units: usize, layers: usize, dropout: f64) -> Self {
        self.backbone_units = units;
        self.backbone_layers = layers;
        self.backbone_dropout = dropout;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.backbone_layers > 0 && self.backbone_units == 0 {
            return Err(NcpsError::config("backbone_units must be positive"));
        }
        if !(0.0..1.0).contains(&self.backbone_dropout) {
            return Err(NcpsError::config(format!(
                "backbone_dropout must be in [0, 1), got {}",
                self.backbone_dropout
            )));
        }
        Ok(())
    }
}

/// A Closed-form Continuous-time cell
///
/// Processes a single time step. [`crate::rnn::CfC`] wraps it for sequences.
#[derive(Module, Debug)]
pub struct CfCCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    /// 0=Default, 1=Pure, 2=NoGate
    #[module(skip)]
    mode: u8,
    /// See [`Activation::code`]
    #[module(skip)]
    activation: u8,
    backbone: Vec<Linear<B>>,
    dropout: Dropout,
    ff1: Linear<B>,
    ff2: Option<Linear<B>>,
    time_a: Option<Linear<B>>,
    time_b: Option<Linear<B>>,
    w_tau: Option<Param<Tensor<B, 1>>>,
    a: Option<Param<Tensor<B, 1>>>,
    /// `[head_input, hidden_size]`, same layout as the head weights
    sparsity_mask: Option<Param<Tensor<B, 2>>>,
}

impl<B: Backend> CfCCell<B> {
    /// Create a CfC cell in default mode without backbone
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let options = CfcOptions::default();
        Self::build(input_size, hidden_size, &options, device)
    }

    pub fn with_options(
        input_size: usize,
        hidden_size: usize,
        options: &CfcOptions,
        device: &B::Device,
    ) -> Result<Self> {
        options.validate()?;
        if input_size == 0 || hidden_size == 0 {
            return Err(NcpsError::config(format!(
                "CfC cell sizes must be positive (input={}, hidden={})",
                input_size, hidden_size
            )));
        }
        Ok(Self::build(input_size, hidden_size, options, device))
    }

    fn build(
        input_size: usize,
        hidden_size: usize,
        options: &CfcOptions,
        device: &B::Device,
    ) -> Self {
        let cat_size = input_size + hidden_size;
        let mut backbone = Vec::with_capacity(options.backbone_layers);
        for layer in 0..options.backbone_layers {
            let d_input = if layer == 0 {
                cat_size
            } else {
                options.backbone_units
            };
            backbone.push(LinearConfig::new(d_input, options.backbone_units).init(device));
        }
        let head_input = if options.backbone_layers > 0 {
            options.backbone_units
        } else {
            cat_size
        };
        let head = || LinearConfig::new(head_input, hidden_size).init(device);

        let (ff2, time_a, time_b, w_tau, a) = match options.mode {
            CfcMode::Pure => (
                None,
                None,
                None,
                Some(Param::from_tensor(Tensor::zeros([hidden_size], device))),
                Some(Param::from_tensor(Tensor::ones([hidden_size], device))),
            ),
            CfcMode::Default | CfcMode::NoGate => {
                (Some(head()), Some(head()), Some(head()), None, None)
            }
        };

        Self {
            input_size,
            hidden_size,
            mode: options.mode.code(),
            activation: options.activation.code(),
            backbone,
            dropout: DropoutConfig::new(options.backbone_dropout).init(),
            ff1: head(),
            ff2,
            time_a,
            time_b,
            w_tau,
            a,
            sparsity_mask: None,
        }
    }

    /// Switch mode, re-initializing the heads. A sparsity mask is kept.
    pub fn with_mode(self, mode: CfcMode) -> Self {
        let device = self.ff1.weight.device();
        let options = CfcOptions {
            mode,
            activation: self.activation(),
            backbone_units: self.backbone_units(),
            backbone_layers: self.backbone.len(),
            backbone_dropout: self.dropout.prob,
        };
        let mut cell = Self::build(self.input_size, self.hidden_size, &options, &device);
        cell.sparsity_mask = self.sparsity_mask;
        cell
    }

    /// Restrict the head weights to the connections allowed by `mask`.
    ///
    /// The mask has shape `[input_size + hidden_size, hidden_size]`; non-zero
    /// entries are allowed connections. Only cells without backbone accept a
    /// mask, since the backbone mixes all inputs before the heads.
    pub fn with_sparsity_mask(mut self, mask: Array2<f32>) -> Result<Self> {
        if !self.backbone.is_empty() {
            return Err(NcpsError::config(
                "a sparsity mask cannot be combined with a backbone",
            ));
        }
        let expected = (self.input_size + self.hidden_size, self.hidden_size);
        if mask.dim() != expected {
            return Err(NcpsError::shape(format!(
                "sparsity mask is {:?}, expected {:?}",
                mask.dim(),
                expected
            )));
        }
        let device = self.ff1.weight.device();
        let data: Vec<f32> = mask.iter().map(|&x| x.abs()).collect();
        let tensor =
            Tensor::<B, 1>::from_floats(data.as_slice(), &device).reshape([expected.0, expected.1]);
        self.sparsity_mask = Some(Param::from_tensor(tensor).set_require_grad(false));
        Ok(self)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn mode(&self) -> CfcMode {
        CfcMode::from_code(self.mode)
    }

    pub fn activation(&self) -> Activation {
        Activation::from_code(self.activation)
    }

    pub fn backbone_layers(&self) -> usize {
        self.backbone.len()
    }

    fn backbone_units(&self) -> usize {
        self.backbone
            .first()
            .map(|layer| layer.weight.val().dims()[1])
            .unwrap_or(128)
    }

    pub fn has_sparsity_mask(&self) -> bool {
        self.sparsity_mask.is_some()
    }

    fn masked_linear(&self, layer: &Linear<B>, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let Some(mask) = &self.sparsity_mask else {
            return layer.forward(x);
        };
        let weight = layer.weight.val().mul(mask.val());
        let output = x.matmul(weight);
        match &layer.bias {
            Some(bias) => output + bias.val().unsqueeze(),
            None => output,
        }
    }

    fn backbone_forward(&self, mut x: Tensor<B, 2>) -> Tensor<B, 2> {
        let activation = self.activation();
        for (index, layer) in self.backbone.iter().enumerate() {
            x = activation.apply(layer.forward(x));
            if index > 0 {
                x = self.dropout.forward(x);
            }
        }
        x
    }

    /// One step of the cell.
    ///
    /// * `input` - `[batch, input_size]`
    /// * `hx` - `[batch, hidden_size]`
    /// * `ts` - elapsed time per sample, `[batch]`
    ///
    /// Returns `(output, new_hidden)`; both are the new hidden state.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        hx: Tensor<B, 2>,
        ts: Tensor<B, 1>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch_size, _] = input.dims();
        let x = self.backbone_forward(Tensor::cat(vec![input, hx], 1));
        let ts = ts
            .unsqueeze_dim::<2>(1)
            .expand([batch_size, self.hidden_size]);

        let ff1 = self.masked_linear(&self.ff1, x.clone());

        let new_hidden = match (&self.w_tau, &self.a, &self.ff2, &self.time_a, &self.time_b) {
            (Some(w_tau), Some(a), _, _, _) => {
                let a = a.val().unsqueeze::<2>();
                let w_tau = w_tau.val().unsqueeze::<2>();
                let decay = ts.mul(ff1.clone().abs().add(w_tau.abs())).neg().exp();
                a.clone() - a.mul(decay).mul(ff1)
            }
            (_, _, Some(ff2), Some(time_a), Some(time_b)) => {
                let ff1 = ff1.tanh();
                let ff2 = self.masked_linear(ff2, x.clone()).tanh();
                let t_a = time_a.forward(x.clone());
                let t_b = time_b.forward(x);
                let t_interp = activation::sigmoid(t_a.mul(ts).add(t_b));

                if self.mode() == CfcMode::NoGate {
                    ff1 + t_interp.mul(ff2)
                } else {
                    ff1.mul(t_interp.clone().neg().add_scalar(1.0)) + t_interp.mul(ff2)
                }
            }
            _ => ff1.tanh(),
        };

        (new_hidden.clone(), new_hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn ones_ts(batch: usize) -> Tensor<TestBackend, 1> {
        Tensor::ones([batch], &Default::default())
    }

    #[test]
    fn test_cfc_cell_creation() {
        let device = Default::default();
        let cell = CfCCell::<TestBackend>::new(20, 50, &device);

        assert_eq!(cell.input_size(), 20);
        assert_eq!(cell.hidden_size(), 50);
        assert_eq!(cell.mode(), CfcMode::Default);
        assert_eq!(cell.backbone_layers(), 0);
    }

    #[test]
    fn test_all_modes_forward_shapes() {
        let device = Default::default();
        for mode in [CfcMode::Default, CfcMode::Pure, CfcMode::NoGate] {
            let cell = CfCCell::<TestBackend>::new(6, 10, &device).with_mode(mode);
            assert_eq!(cell.mode(), mode);

            let input = Tensor::<TestBackend, 2>::ones([3, 6], &device);
            let hx = Tensor::<TestBackend, 2>::zeros([3, 10], &device);
            let (output, hidden) = cell.forward(input, hx, ones_ts(3));
            assert_eq!(output.dims(), [3, 10]);
            assert_eq!(hidden.dims(), [3, 10]);
        }
    }

    #[test]
    fn test_pure_mode_with_zero_input_matches_closed_form() {
        let device = Default::default();
        let cell = CfCCell::<TestBackend>::new(4, 5, &device).with_mode(CfcMode::Pure);
        let ff1_out = cell.ff1.forward(Tensor::<TestBackend, 2>::zeros([1, 9], &device));
        let (output, _) = cell.forward(
            Tensor::zeros([1, 4], &device),
            Tensor::zeros([1, 5], &device),
            ones_ts(1),
        );
        // With zero input the head output is its bias b; h = 1 - exp(-(|b|)) * b
        let b: Vec<f32> = ff1_out.into_data().to_vec().unwrap();
        let h: Vec<f32> = output.into_data().to_vec().unwrap();
        for (bi, hi) in b.iter().zip(h.iter()) {
            let expected = 1.0 - (-bi.abs()).exp() * bi;
            assert!((expected - hi).abs() < 1e-5);
        }
    }

    #[test]
    fn test_elapsed_time_changes_output() {
        let device = Default::default();
        let cell = CfCCell::<TestBackend>::new(4, 8, &device);
        let input = Tensor::<TestBackend, 2>::random([2, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let hx = Tensor::<TestBackend, 2>::zeros([2, 8], &device);

        let (short, _) = cell.forward(input.clone(), hx.clone(), Tensor::full([2], 0.1, &device));
        let (long, _) = cell.forward(input, hx, Tensor::full([2], 5.0, &device));

        let diff = (short - long).abs().sum().into_scalar();
        assert!(diff > 0.0, "elapsed time should influence the gate");
    }

    #[test]
    fn test_backbone_forward() {
        let device = Default::default();
        let options = CfcOptions::default()
            .with_backbone(16, 2, 0.1)
            .with_activation(Activation::Relu);
        let cell = CfCCell::<TestBackend>::with_options(5, 7, &options, &device).unwrap();
        assert_eq!(cell.backbone_layers(), 2);
        assert_eq!(cell.activation(), Activation::Relu);

        let (output, _) = cell.forward(
            Tensor::ones([4, 5], &device),
            Tensor::zeros([4, 7], &device),
            ones_ts(4),
        );
        assert_eq!(output.dims(), [4, 7]);
    }

    #[test]
    fn test_activation_survives_mode_switch() {
        let device = Default::default();
        for activation in [Activation::Tanh, Activation::Gelu, Activation::Silu] {
            let options = CfcOptions::default()
                .with_backbone(8, 1, 0.0)
                .with_activation(activation);
            let cell = CfCCell::<TestBackend>::with_options(3, 4, &options, &device)
                .unwrap()
                .with_mode(CfcMode::NoGate);
            assert_eq!(cell.activation(), activation);
            assert_eq!(cell.backbone_layers(), 1);
        }
    }

    #[test]
    fn test_invalid_dropout_rejected() {
        let device = Default::default();
        let options = CfcOptions::default().with_backbone(8, 1, 1.5);
        assert!(CfCCell::<TestBackend>::with_options(5, 7, &options, &device).is_err());
    }

    #[test]
    fn test_zero_mask_removes_input_dependence() {
        let device = Default::default();
        let mask = Array2::<f32>::zeros((3 + 4, 4));
        let cell = CfCCell::<TestBackend>::new(3, 4, &device)
            .with_sparsity_mask(mask)
            .unwrap();
        assert!(cell.has_sparsity_mask());

        let hx = Tensor::<TestBackend, 2>::zeros([1, 4], &device);
        let (a, _) = cell.forward(Tensor::zeros([1, 3], &device), hx.clone(), ones_ts(1));
        let (b, _) = cell.forward(Tensor::ones([1, 3], &device) * 5.0, hx, ones_ts(1));

        // Only the ungated time heads still read the input.
        let ff1_a = cell.masked_linear(&cell.ff1, Tensor::zeros([1, 7], &device));
        let ff1_b = cell.masked_linear(&cell.ff1, Tensor::ones([1, 7], &device));
        let head_diff = (ff1_a - ff1_b).abs().sum().into_scalar();
        assert!(head_diff < 1e-6);
        assert_eq!(a.dims(), b.dims());
    }

    #[test]
    fn test_mask_shape_checked() {
        let device = Default::default();
        let mask = Array2::<f32>::ones((4, 4));
        assert!(CfCCell::<TestBackend>::new(3, 4, &device)
            .with_sparsity_mask(mask)
            .is_err());
    }

    #[test]
    fn test_mask_rejected_with_backbone() {
        let device = Default::default();
        let options = CfcOptions::default().with_backbone(8, 1, 0.0);
        let cell = CfCCell::<TestBackend>::with_options(3, 4, &options, &device).unwrap();
        assert!(cell.with_sparsity_mask(Array2::ones((7, 4))).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("pure".parse::<CfcMode>().unwrap(), CfcMode::Pure);
        assert_eq!("no_gate".parse::<CfcMode>().unwrap(), CfcMode::NoGate);
        assert!("gated".parse::<CfcMode>().is_err());
    }
}
