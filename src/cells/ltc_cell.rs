//! Liquid Time-Constant (LTC) Cell Implementation
//!
//! Reference: Hasani et al., "Liquid time-constant networks", AAAI 2021
//!
//! The membrane ODE is unfolded with a semi-implicit Euler step:
//!
//! ```text
//! v' = (cm/Δt · v + gleak · vleak + Σ w·σ(v)·erev) / (cm/Δt + gleak + Σ w·σ(v))
//! ```
//!
//! with `Δt = elapsed_time / ode_unfolds`.

use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{NcpsError, Result};
use crate::wirings::Wiring;

/// Input/output mapping modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// y = w * x + b
    #[default]
    Affine,
    /// y = w * x
    Linear,
    /// Pass-through
    None,
}

#[derive(Debug, Module)]
pub struct LTCCell<B: Backend> {
    gleak: Param<Tensor<B, 1>>,
    vleak: Param<Tensor<B, 1>>,
    cm: Param<Tensor<B, 1>>,
    sigma: Param<Tensor<B, 2>>,
    mu: Param<Tensor<B, 2>>,
    w: Param<Tensor<B, 2>>,
    sensory_sigma: Param<Tensor<B, 2>>,
    sensory_mu: Param<Tensor<B, 2>>,
    sensory_w: Param<Tensor<B, 2>>,
    /// Reversal potentials, fixed by the wiring polarity
    erev: Param<Tensor<B, 2>>,
    sensory_erev: Param<Tensor<B, 2>>,
    sparsity_mask: Param<Tensor<B, 2>>,
    sensory_sparsity_mask: Param<Tensor<B, 2>>,
    input_w: Option<Param<Tensor<B, 1>>>,
    input_b: Option<Param<Tensor<B, 1>>>,
    output_w: Option<Param<Tensor<B, 1>>>,
    output_b: Option<Param<Tensor<B, 1>>>,
    #[module(skip)]
    ode_unfolds: usize,
    #[module(skip)]
    epsilon: f64,
    #[module(skip)]
    state_size: usize,
    #[module(skip)]
    motor_size: usize,
    #[module(skip)]
    sensory_size: usize,
}

fn frozen<B: Backend>(matrix: &ndarray::Array2<i32>, absolute: bool, device: &B::Device) -> Param<Tensor<B, 2>> {
    let (rows, cols) = matrix.dim();
    let data: Vec<f32> = matrix
        .iter()
        .map(|&x| if absolute { x.abs() as f32 } else { x as f32 })
        .collect();
    let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([rows, cols]);
    Param::from_tensor(tensor).set_require_grad(false)
}

fn uniform<B: Backend, const D: usize>(
    shape: [usize; D],
    min: f64,
    max: f64,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    Param::from_tensor(Tensor::random(shape, Distribution::Uniform(min, max), device))
}

fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.exp().add_scalar(1.0).log()
}

impl<B: Backend> LTCCell<B> {
    /// Creates an LTC cell for `wiring`.
    ///
    /// `sensory_size` overrides the wiring's input dimension; one of the two
    /// must be known. Input and output mappings default to affine.
    pub fn new(wiring: &dyn Wiring, sensory_size: Option<usize>, device: &B::Device) -> Result<Self> {
        let state_size = wiring.units();
        let motor_size = wiring.output_dim().unwrap_or(state_size);
        let sensory_size = sensory_size.or_else(|| wiring.input_dim()).ok_or_else(|| {
            NcpsError::wiring("LTCCell needs a sensory size or a built wiring")
        })?;

        let erev_matrix = wiring.adjacency_matrix();
        let (sensory_erev, sensory_sparsity_mask) = match wiring.sensory_adjacency_matrix() {
            Some(sensory) if sensory.nrows() == sensory_size => (
                frozen(sensory, false, device),
                frozen(sensory, true, device),
            ),
            Some(sensory) => {
                return Err(NcpsError::shape(format!(
                    "wiring was built for {} inputs but the cell expects {}",
                    sensory.nrows(),
                    sensory_size
                )))
            }
            None => {
                let ones = Tensor::ones([sensory_size, state_size], device);
                (
                    Param::from_tensor(ones.clone()).set_require_grad(false),
                    Param::from_tensor(ones).set_require_grad(false),
                )
            }
        };

        let cell = Self {
            gleak: uniform([state_size], 0.001, 1.0, device),
            vleak: uniform([state_size], -0.2, 0.2, device),
            cm: uniform([state_size], 0.4, 0.6, device),
            sigma: uniform([state_size, state_size], 3.0, 8.0, device),
            mu: uniform([state_size, state_size], 0.3, 0.8, device),
            w: uniform([state_size, state_size], 0.001, 1.0, device),
            sensory_sigma: uniform([sensory_size, state_size], 3.0, 8.0, device),
            sensory_mu: uniform([sensory_size, state_size], 0.3, 0.8, device),
            sensory_w: uniform([sensory_size, state_size], 0.001, 1.0, device),
            erev: frozen(erev_matrix, false, device),
            sensory_erev,
            sparsity_mask: frozen(erev_matrix, true, device),
            sensory_sparsity_mask,
            input_w: None,
            input_b: None,
            output_w: None,
            output_b: None,
            ode_unfolds: 6,
            epsilon: 1e-8,
            state_size,
            motor_size,
            sensory_size,
        };
        Ok(cell
            .with_input_mapping(MappingMode::Affine, device)
            .with_output_mapping(MappingMode::Affine, device))
    }

    pub fn with_ode_unfolds(mut self, unfolds: usize) -> Self {
        self.ode_unfolds = unfolds.max(1);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_input_mapping(mut self, mode: MappingMode, device: &B::Device) -> Self {
        let size = self.sensory_size;
        (self.input_w, self.input_b) = Self::mapping_params(mode, size, device);
        self
    }

    pub fn with_output_mapping(mut self, mode: MappingMode, device: &B::Device) -> Self {
        let size = self.motor_size;
        (self.output_w, self.output_b) = Self::mapping_params(mode, size, device);
        self
    }

    #[allow(clippy::type_complexity)]
    fn mapping_params(
        mode: MappingMode,
        size: usize,
        device: &B::Device,
    ) -> (Option<Param<Tensor<B, 1>>>, Option<Param<Tensor<B, 1>>>) {
        let weight = || Some(Param::from_tensor(Tensor::ones([size], device)));
        match mode {
            MappingMode::Affine => (
                weight(),
                Some(Param::from_tensor(Tensor::zeros([size], device))),
            ),
            MappingMode::Linear => (weight(), None),
            MappingMode::None => (None, None),
        }
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn motor_size(&self) -> usize {
        self.motor_size
    }

    pub fn sensory_size(&self) -> usize {
        self.sensory_size
    }

    pub fn ode_unfolds(&self) -> usize {
        self.ode_unfolds
    }

    /// Number of synapses kept by the wiring mask
    pub fn synapse_count(&self) -> usize {
        self.sparsity_mask.val().sum().into_scalar().elem::<f32>() as usize
    }

    fn map_inputs(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut result = inputs;
        if let Some(ref w) = self.input_w {
            result = result.mul(w.val().unsqueeze());
        }
        if let Some(ref b) = self.input_b {
            result = result.add(b.val().unsqueeze());
        }
        result
    }

    fn map_outputs(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut output = state.narrow(1, 0, self.motor_size);
        if let Some(ref w) = self.output_w {
            output = output.mul(w.val().unsqueeze());
        }
        if let Some(ref b) = self.output_b {
            output = output.add(b.val().unsqueeze());
        }
        output
    }

    /// `σ(sigma · (v - mu))` for every (pre, post) pair: `[batch, pre, post]`
    fn synapse_sigmoid(
        v_pre: Tensor<B, 2>,
        mu: Tensor<B, 2>,
        sigma: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let [batch, pre] = v_pre.dims();
        let [_, post] = mu.dims();
        let v = v_pre.reshape([batch, pre, 1]);
        let diff = v.sub(mu.reshape([1, pre, post]));
        activation::sigmoid(sigma.reshape([1, pre, post]).mul(diff))
    }

    fn ode_solver(
        &self,
        inputs: Tensor<B, 2>,
        state: Tensor<B, 2>,
        elapsed_time: Tensor<B, 1>,
    ) -> Tensor<B, 2> {
        let [batch, state_size] = state.dims();
        let sensory_size = self.sensory_size;

        let dt = elapsed_time
            .div_scalar(self.ode_unfolds as f64)
            .unsqueeze_dim::<2>(1)
            .expand([batch, state_size]);
        let cm_t = softplus(self.cm.val()).unsqueeze::<2>().expand([batch, state_size]).div(dt);
        let gleak = softplus(self.gleak.val()).unsqueeze::<2>().expand([batch, state_size]);
        let vleak = self.vleak.val().unsqueeze::<2>().expand([batch, state_size]);

        // Sensory synapses do not depend on the state and are computed once.
        let sensory_w_activation = softplus(self.sensory_w.val())
            .unsqueeze::<3>()
            .mul(Self::synapse_sigmoid(
                inputs,
                self.sensory_mu.val(),
                self.sensory_sigma.val(),
            ))
            .mul(self.sensory_sparsity_mask.val().reshape([1, sensory_size, state_size]));
        let sensory_rev_activation = sensory_w_activation
            .clone()
            .mul(self.sensory_erev.val().unsqueeze::<3>());
        let w_numerator_sensory: Tensor<B, 2> = sensory_rev_activation.sum_dim(1).squeeze(1);
        let w_denominator_sensory: Tensor<B, 2> = sensory_w_activation.sum_dim(1).squeeze(1);

        let w_pos = softplus(self.w.val())
            .mul(self.sparsity_mask.val())
            .unsqueeze::<3>();
        let erev = self.erev.val().unsqueeze::<3>();

        let mut v_pre = state;
        for _ in 0..self.ode_unfolds {
            let w_activation = w_pos.clone().mul(Self::synapse_sigmoid(
                v_pre.clone(),
                self.mu.val(),
                self.sigma.val(),
            ));
            let rev_activation = w_activation.clone().mul(erev.clone());

            let w_numerator: Tensor<B, 2> = rev_activation
                .sum_dim(1)
                .squeeze::<2>(1)
                .add(w_numerator_sensory.clone());
            let w_denominator: Tensor<B, 2> = w_activation
                .sum_dim(1)
                .squeeze::<2>(1)
                .add(w_denominator_sensory.clone());

            let numerator = cm_t
                .clone()
                .mul(v_pre)
                .add(gleak.clone().mul(vleak.clone()))
                .add(w_numerator);
            let denominator = cm_t
                .clone()
                .add(gleak.clone())
                .add(w_denominator)
                .add_scalar(self.epsilon);

            v_pre = numerator.div(denominator);
        }

        v_pre
    }

    /// One step of the cell.
    ///
    /// * `inputs` - `[batch, sensory_size]`
    /// * `states` - `[batch, state_size]`
    /// * `elapsed_time` - `[batch]`
    ///
    /// Returns `(motor_output [batch, motor_size], new_state [batch, state_size])`.
    pub fn forward(
        &self,
        inputs: Tensor<B, 2>,
        states: Tensor<B, 2>,
        elapsed_time: Tensor<B, 1>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let new_states = self.ode_solver(self.map_inputs(inputs), states, elapsed_time);
        let output = self.map_outputs(new_states.clone());
        (output, new_states)
    }
}
