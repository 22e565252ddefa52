//! Liquid Time-Constant (LTC) RNN Layer
//!
//! Unrolls an [`LTCCell`] over a sequence with per-step elapsed times.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::cells::{LTCCell, MappingMode};
use crate::error::Result;
use crate::wirings::Wiring;

/// LTC RNN Layer
#[derive(Module, Debug)]
pub struct LTC<B: Backend> {
    cell: LTCCell<B>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    state_size: usize,
    #[module(skip)]
    motor_size: usize,
    #[module(skip)]
    batch_first: bool,
    #[module(skip)]
    return_sequences: bool,
}

impl<B: Backend> LTC<B> {
    /// Create an LTC layer for `wiring`, building it for `input_size` first.
    pub fn new(input_size: usize, wiring: &mut dyn Wiring, device: &B::Device) -> Result<Self> {
        wiring.build(input_size)?;
        let cell = LTCCell::new(&*wiring, Some(input_size), device)?;

        Ok(Self {
            input_size,
            state_size: cell.state_size(),
            motor_size: cell.motor_size(),
            cell,
            batch_first: true,
            return_sequences: true,
        })
    }

    /// Replaces the input and output mappings of the cell.
    pub fn with_mapping(mut self, input: MappingMode, output: MappingMode, device: &B::Device) -> Self {
        self.cell = self
            .cell
            .with_input_mapping(input, device)
            .with_output_mapping(output, device);
        self
    }

    pub fn with_ode_unfolds(mut self, unfolds: usize) -> Self {
        self.cell = self.cell.with_ode_unfolds(unfolds);
        self
    }

    /// Set whether input is batch-first (default: true)
    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    /// Set whether to return full sequences (default: true)
    pub fn with_return_sequences(mut self, return_sequences: bool) -> Self {
        self.return_sequences = return_sequences;
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn motor_size(&self) -> usize {
        self.motor_size
    }

    pub fn cell(&self) -> &LTCCell<B> {
        &self.cell
    }

    /// Forward pass through the LTC RNN layer
    ///
    /// # Arguments
    /// * `input` - `[batch, seq, features]`, or `[seq, batch, features]` when
    ///   not batch-first
    /// * `state` - Optional initial state `[batch, state_size]`
    /// * `timespans` - Optional elapsed times laid out like the first two
    ///   input dimensions; ones when absent
    ///
    /// # Returns
    /// `(output, final_state)`, output being `[batch, seq, motor_size]` or
    /// `[batch, 1, motor_size]` without `return_sequences`.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<Tensor<B, 2>>,
        timespans: Option<Tensor<B, 2>>,
    ) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let device = input.device();
        let [d0, d1, _] = input.dims();
        let (batch_size, seq_len, time_axis) = if self.batch_first {
            (d0, d1, 1)
        } else {
            (d1, d0, 0)
        };

        let mut current_state =
            state.unwrap_or_else(|| Tensor::zeros([batch_size, self.state_size], &device));
        let timespans = timespans.unwrap_or_else(|| Tensor::ones([d0, d1], &device));

        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step_input: Tensor<B, 2> = input.clone().narrow(time_axis, t, 1).squeeze(time_axis);
            let step_time: Tensor<B, 1> = timespans
                .clone()
                .narrow(time_axis, t, 1)
                .reshape([batch_size]);

            let (output, new_state) = self.cell.forward(step_input, current_state, step_time);
            current_state = new_state;

            if self.return_sequences || t == seq_len - 1 {
                outputs.push(output);
            }
        }

        (Tensor::stack(outputs, 1), current_state)
    }
}
