//! Wired CfC Cell Implementation
//!
//! One masked CfC cell per wiring layer. Layer `l` reads the output of layer
//! `l - 1` (or the sensory input for the first layer) through the synapses
//! the wiring allows, plus its own recurrent state.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::Array2;

use crate::cells::{CfCCell, CfcMode};
use crate::error::{NcpsError, Result};
use crate::wirings::Wiring;

#[derive(Module, Debug)]
pub struct WiredCfCCell<B: Backend> {
    layers: Vec<CfCCell<B>>,
    #[module(skip)]
    state_size: usize,
    #[module(skip)]
    motor_size: usize,
    #[module(skip)]
    sensory_size: usize,
    #[module(skip)]
    layer_sizes: Vec<usize>,
}

/// Mask of shape `[inputs + hidden, hidden]`: wiring-derived input synapses on
/// top, identity for the layer's own recurrent state below.
fn layer_mask(wiring: &dyn Wiring, layer: usize) -> Result<Array2<f32>> {
    let hidden_units = wiring.neurons_of_layer(layer);
    let num_hidden = hidden_units.len();

    let input_mask: Array2<f32> = if layer == 0 {
        let sensory = wiring.sensory_adjacency_matrix().ok_or_else(|| {
            NcpsError::wiring("the first layer needs the sensory adjacency matrix")
        })?;
        let mut mask = Array2::zeros((sensory.nrows(), num_hidden));
        for (column, &neuron) in hidden_units.iter().enumerate() {
            for (row, &value) in sensory.column(neuron).iter().enumerate() {
                mask[[row, column]] = value.abs() as f32;
            }
        }
        mask
    } else {
        let adjacency = wiring.adjacency_matrix();
        let previous = wiring.neurons_of_layer(layer - 1);
        let mut mask = Array2::zeros((previous.len(), num_hidden));
        for (column, &neuron) in hidden_units.iter().enumerate() {
            for (row, &source) in previous.iter().enumerate() {
                mask[[row, column]] = adjacency[[source, neuron]].abs() as f32;
            }
        }
        mask
    };

    let rows = input_mask.nrows();
    let mut extended = Array2::zeros((rows + num_hidden, num_hidden));
    extended
        .slice_mut(ndarray::s![..rows, ..])
        .assign(&input_mask);
    for i in 0..num_hidden {
        extended[[rows + i, i]] = 1.0;
    }
    Ok(extended)
}

impl<B: Backend> WiredCfCCell<B> {
    /// Create a wired cell. The wiring must already be built.
    pub fn new(wiring: &dyn Wiring, mode: CfcMode, device: &B::Device) -> Result<Self> {
        let input_dim = wiring.input_dim().ok_or_else(|| {
            NcpsError::wiring(
                "Unknown number of input features. Build the wiring first by calling wiring.build(input_size).",
            )
        })?;

        let num_layers = wiring.num_layers();
        let state_size = wiring.units();
        let motor_size = wiring.output_dim().unwrap_or(state_size);
        let mut layers = Vec::with_capacity(num_layers);
        let mut layer_sizes = Vec::with_capacity(num_layers);

        let mut layer_input = input_dim;
        for layer in 0..num_layers {
            let num_hidden = wiring.neurons_of_layer(layer).len();
            if num_hidden == 0 {
                return Err(NcpsError::wiring(format!("layer {} has no neurons", layer)));
            }
            let cell = CfCCell::new(layer_input, num_hidden, device)
                .with_mode(mode)
                .with_sparsity_mask(layer_mask(wiring, layer)?)?;
            layers.push(cell);
            layer_sizes.push(num_hidden);
            layer_input = num_hidden;
        }

        Ok(Self {
            layers,
            state_size,
            motor_size,
            sensory_size: input_dim,
            layer_sizes,
        })
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

    pub fn num_layers(&self) -> usize {
        self.layer_sizes.len()
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// One step through every layer.
    ///
    /// * `input` - `[batch, sensory_size]`
    /// * `hx` - `[batch, state_size]`, layer states concatenated in layer order
    /// * `ts` - `[batch]`
    ///
    /// Returns `(motor_output [batch, motor_size], new_state [batch, state_size])`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        hx: Tensor<B, 2>,
        ts: Tensor<B, 1>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let mut start = 0;
        let mut new_states = Vec::with_capacity(self.num_layers());
        let mut layer_input = input;

        for (layer, &size) in self.layers.iter().zip(self.layer_sizes.iter()) {
            let state = hx.clone().narrow(1, start, size);
            start += size;
            let (output, _) = layer.forward(layer_input, state, ts.clone());
            layer_input = output.clone();
            new_states.push(output);
        }

        let new_hx = Tensor::cat(new_states, 1);
        let [_, last_size] = layer_input.dims();
        let output = if self.motor_size < last_size {
            layer_input.narrow(1, 0, self.motor_size)
        } else {
            layer_input
        };

        (output, new_hx)
    }
}
