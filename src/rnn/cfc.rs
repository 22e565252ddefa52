//! Closed-form Continuous-time (CfC) RNN Layer
//!
//! Unrolls a [`CfCCell`] or a [`WiredCfCCell`] over a sequence and handles
//! batching, initial state, elapsed times and the optional projection.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::cells::{CfCCell, CfcMode, CfcOptions, WiredCfCCell};
use crate::error::{NcpsError, Result};
use crate::wirings::Wiring;

/// CfC RNN Layer
///
/// Exactly one of `cell` and `wired` is set.
#[derive(Module, Debug)]
pub struct CfC<B: Backend> {
    cell: Option<CfCCell<B>>,
    wired: Option<WiredCfCCell<B>>,
    proj: Option<Linear<B>>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    #[module(skip)]
    batch_first: bool,
    #[module(skip)]
    return_sequences: bool,
    #[module(skip)]
    output_size: usize,
}

impl<B: Backend> CfC<B> {
    /// Dense CfC layer in default mode without backbone
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self::from_cell(CfCCell::new(input_size, hidden_size, device))
    }

    /// Dense CfC layer with mode, activation and backbone taken from `options`
    pub fn with_options(
        input_size: usize,
        hidden_size: usize,
        options: &CfcOptions,
        device: &B::Device,
    ) -> Result<Self> {
        let cell = CfCCell::with_options(input_size, hidden_size, options, device)?;
        Ok(Self::from_cell(cell))
    }

    fn from_cell(cell: CfCCell<B>) -> Self {
        let input_size = cell.input_size();
        let hidden_size = cell.hidden_size();
        Self {
            cell: Some(cell),
            wired: None,
            proj: None,
            input_size,
            hidden_size,
            batch_first: true,
            return_sequences: true,
            output_size: hidden_size,
        }
    }

    /// Wired CfC layer. The wiring is built for `input_size` if it is not
    /// built yet; the layer outputs the wiring's motor neurons.
    pub fn with_wiring(
        input_size: usize,
        wiring: &mut dyn Wiring,
        mode: CfcMode,
        device: &B::Device,
    ) -> Result<Self> {
        wiring.build(input_size)?;
        let wired = WiredCfCCell::new(&*wiring, mode, device)?;
        let hidden_size = wired.state_size();
        let output_size = wired.motor_size();

        Ok(Self {
            cell: None,
            wired: Some(wired),
            proj: None,
            input_size,
            hidden_size,
            batch_first: true,
            return_sequences: true,
            output_size,
        })
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

    /// Adds a linear projection of the cell output to `proj_size` features
    pub fn with_proj_size(mut self, proj_size: usize, device: &B::Device) -> Self {
        let cell_output = self.cell_output_size();
        self.proj = Some(
            LinearConfig::new(cell_output, proj_size)
                .with_bias(true)
                .init(device),
        );
        self.output_size = proj_size;
        self
    }

    fn cell_output_size(&self) -> usize {
        match &self.wired {
            Some(wired) => wired.motor_size(),
            None => self.hidden_size,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Size of the hidden state carried between steps
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Number of features per output step (after projection)
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn is_wired(&self) -> bool {
        self.wired.is_some()
    }

    pub fn mode(&self) -> Option<CfcMode> {
        self.cell.as_ref().map(|cell| cell.mode())
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        ts: Tensor<B, 1>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        match (&self.cell, &self.wired) {
            (_, Some(wired)) => wired.forward(input, state, ts),
            (Some(cell), None) => cell.forward(input, state, ts),
            (None, None) => unreachable!("CfC layer without a cell"),
        }
    }

    /// Checks input, state and timespan shapes before [`CfC::forward`].
    pub fn check_shapes(
        &self,
        input: &Tensor<B, 3>,
        state: Option<&Tensor<B, 2>>,
        timespans: Option<&Tensor<B, 2>>,
    ) -> Result<()> {
        let dims = input.dims();
        let (batch, seq) = if self.batch_first {
            (dims[0], dims[1])
        } else {
            (dims[1], dims[0])
        };
        if dims[2] != self.input_size {
            return Err(NcpsError::shape(format!(
                "expected {} input features, got {}",
                self.input_size, dims[2]
            )));
        }
        if seq == 0 {
            return Err(NcpsError::shape("empty input sequence"));
        }
        if let Some(state) = state {
            if state.dims() != [batch, self.hidden_size] {
                return Err(NcpsError::shape(format!(
                    "initial state must be [{}, {}], got {:?}",
                    batch,
                    self.hidden_size,
                    state.dims()
                )));
            }
        }
        if let Some(timespans) = timespans {
            if timespans.dims() != [dims[0], dims[1]] {
                return Err(NcpsError::shape(format!(
                    "timespans must be [{}, {}], got {:?}",
                    dims[0],
                    dims[1],
                    timespans.dims()
                )));
            }
        }
        Ok(())
    }

    /// Forward pass through the CfC RNN layer
    ///
    /// # Arguments
    /// * `input` - `[batch, seq, features]`, or `[seq, batch, features]` when
    ///   not batch-first
    /// * `state` - Optional initial hidden state `[batch, hidden_size]`
    /// * `timespans` - Optional elapsed times laid out like the first two
    ///   input dimensions; every step lasts 1.0 when absent
    ///
    /// # Returns
    /// `(output, final_state)`, output being `[batch, seq, output_size]` or
    /// `[batch, 1, output_size]` without `return_sequences`.
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
            state.unwrap_or_else(|| Tensor::zeros([batch_size, self.hidden_size], &device));
        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step_input: Tensor<B, 2> = input.clone().narrow(time_axis, t, 1).squeeze(time_axis);
            let ts: Tensor<B, 1> = match &timespans {
                Some(timespans) => timespans.clone().narrow(time_axis, t, 1).reshape([batch_size]),
                None => Tensor::ones([batch_size], &device),
            };

            let (mut output, new_state) = self.step(step_input, current_state, ts);
            current_state = new_state;

            if self.return_sequences || t == seq_len - 1 {
                if let Some(ref proj) = self.proj {
                    output = proj.forward(output);
                }
                outputs.push(output);
            }
        }

        (Tensor::stack(outputs, 1), current_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wirings::{AutoNCP, FullyConnected};
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_cfc_rnn_creation() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device);

        assert_eq!(cfc.input_size(), 20);
        assert_eq!(cfc.hidden_size(), 50);
        assert_eq!(cfc.output_size(), 50);
        assert!(!cfc.is_wired());
    }

    #[test]
    fn test_cfc_rnn_with_wiring() {
        let device = get_test_device();
        let mut wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
        let cfc = CfC::<TestBackend>::with_wiring(20, &mut wiring, CfcMode::Default, &device)
            .unwrap();

        assert!(wiring.is_built());
        assert_eq!(cfc.hidden_size(), 32);
        assert_eq!(cfc.output_size(), 8);

        let input = Tensor::<TestBackend, 3>::zeros([2, 5, 20], &device);
        let (output, state) = cfc.forward(input, None, None);
        assert_eq!(output.dims(), [2, 5, 8]);
        assert_eq!(state.dims(), [2, 32]);
    }

    #[test]
    fn test_wiring_built_for_other_input_rejected() {
        let device = get_test_device();
        let mut wiring = FullyConnected::new(8, Some(2), 1, true).unwrap();
        wiring.build(3).unwrap();
        assert!(CfC::<TestBackend>::with_wiring(4, &mut wiring, CfcMode::Pure, &device).is_err());
    }

    #[test]
    fn test_cfc_rnn_forward() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device);

        let input = Tensor::<TestBackend, 3>::zeros([4, 10, 20], &device);
        let (output, state) = cfc.forward(input, None, None);

        assert_eq!(output.dims(), [4, 10, 50]);
        assert_eq!(state.dims(), [4, 50]);
    }

    #[test]
    fn test_cfc_rnn_with_projection() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device).with_proj_size(10, &device);

        let input = Tensor::<TestBackend, 3>::zeros([4, 10, 20], &device);
        let (output, _) = cfc.forward(input, None, None);

        assert_eq!(output.dims(), [4, 10, 10]);
        assert_eq!(cfc.output_size(), 10);
    }

    #[test]
    fn test_cfc_rnn_backbone_options() {
        let device = get_test_device();
        let options = CfcOptions::default()
            .with_mode(CfcMode::Pure)
            .with_backbone(16, 2, 0.1);
        let cfc = CfC::<TestBackend>::with_options(20, 12, &options, &device).unwrap();
        assert_eq!(cfc.mode(), Some(CfcMode::Pure));

        let input = Tensor::<TestBackend, 3>::zeros([2, 5, 20], &device);
        let (output, _) = cfc.forward(input, None, None);

        assert_eq!(output.dims(), [2, 5, 12]);
    }

    #[test]
    fn test_cfc_rnn_return_last_only() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device).with_return_sequences(false);

        let input = Tensor::<TestBackend, 3>::zeros([4, 10, 20], &device);
        let (output, state) = cfc.forward(input, None, None);

        assert_eq!(output.dims(), [4, 1, 50]);
        assert_eq!(state.dims(), [4, 50]);
    }

    #[test]
    fn test_cfc_rnn_seq_first() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device).with_batch_first(false);

        let input = Tensor::<TestBackend, 3>::zeros([10, 4, 20], &device);
        let timespans = Tensor::<TestBackend, 2>::ones([10, 4], &device);
        let (output, state) = cfc.forward(input, None, Some(timespans));

        assert_eq!(output.dims(), [4, 10, 50]);
        assert_eq!(state.dims(), [4, 50]);
    }

    #[test]
    fn test_timespans_change_output() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(3, 6, &device);
        let input = Tensor::<TestBackend, 3>::ones([1, 4, 3], &device);

        let (a, _) = cfc.forward(input.clone(), None, None);
        let (b, _) = cfc.forward(input, None, Some(Tensor::full([1, 4], 5.0, &device)));

        let diff: f32 = a.sub(b).abs().sum().into_scalar();
        assert!(diff > 0.0);
    }

    #[test]
    fn test_check_shapes() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(3, 6, &device);
        let input = Tensor::<TestBackend, 3>::zeros([2, 4, 3], &device);
        assert!(cfc.check_shapes(&input, None, None).is_ok());

        let bad_state = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
        assert!(cfc.check_shapes(&input, Some(&bad_state), None).is_err());

        let bad_ts = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        assert!(cfc.check_shapes(&input, None, Some(&bad_ts)).is_err());

        let bad_input = Tensor::<TestBackend, 3>::zeros([2, 4, 5], &device);
        assert!(cfc.check_shapes(&bad_input, None, None).is_err());
    }

    #[test]
    fn test_cfc_rnn_with_initial_state() {
        let device = get_test_device();
        let cfc = CfC::<TestBackend>::new(20, 50, &device);

        let input = Tensor::<TestBackend, 3>::zeros([4, 10, 20], &device);
        let initial_state = Tensor::<TestBackend, 2>::ones([4, 50], &device);

        let (output, state) = cfc.forward(input, Some(initial_state), None);

        assert_eq!(output.dims(), [4, 10, 50]);
        assert_eq!(state.dims(), [4, 50]);
    }
}
