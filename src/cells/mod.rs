//! # Single-step Cells
//!
//! Each cell advances a batch of hidden states by one time step. The sequence
//! layers in [`crate::rnn`] unroll them over time.
//!
//! | Cell | Description |
//! |------|-------------|
//! | [`CfCCell`] | Closed-form Continuous-time, optionally backbone-augmented |
//! | [`WiredCfCCell`] | Chain of masked CfC cells following a wiring's layers |
//! | [`LTCCell`] | Liquid Time-Constant with a semi-implicit ODE solver |
//!
//! ## CfC Modes
//!
//! ```text
//! default:  h = tanh(ff1) × (1 - σ) + tanh(ff2) × σ
//! no_gate:  h = tanh(ff1) + tanh(ff2) × σ
//! pure:     h = a - a × exp(-t × (|w_τ| + |ff1|)) × ff1
//! ```
//!
//! where `σ = sigmoid(time_a(x) × t + time_b(x))`.
//!
//! ## Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input` | `[batch, input_size]` |
//! | `hx` | `[batch, state_size]` |
//! | `ts` | `[batch]` |
//! | `output` | `[batch, output_size]` |
//!
//! ```
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use ncps_demos::cells::{CfCCell, CfcMode};
//!
//! let device = Default::default();
//! let cell = CfCCell::<NdArray<f32>>::new(2, 8, &device).with_mode(CfcMode::Pure);
//! let (output, hx) = cell.forward(
//!     Tensor::zeros([4, 2], &device),
//!     Tensor::zeros([4, 8], &device),
//!     Tensor::ones([4], &device),
//! );
//! assert_eq!(output.dims(), [4, 8]);
//! assert_eq!(hx.dims(), [4, 8]);
//! ```

pub mod cfc_cell;
pub mod ltc_cell;
pub mod wired_cfc_cell;

pub use cfc_cell::{CfCCell, CfcMode, CfcOptions};
pub use ltc_cell::{LTCCell, MappingMode};
pub use wired_cfc_cell::WiredCfCCell;
