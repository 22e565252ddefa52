//! # Sequence Layers
//!
//! [`CfC`] and [`LTC`] unroll the single-step cells of [`crate::cells`] over
//! a sequence.
//!
//! | Input layout | Shape |
//! |--------------|-------|
//! | batch-first (default) | `[batch, seq, features]` |
//! | sequence-first | `[seq, batch, features]` |
//!
//! Timespans follow the first two input dimensions and default to ones.
//! With `return_sequences = false` only the last step is kept, as
//! `[batch, 1, output_size]`.
//!
//! ```
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use ncps_demos::cells::CfcMode;
//! use ncps_demos::rnn::CfC;
//! use ncps_demos::wirings::AutoNCP;
//!
//! let device = Default::default();
//! let mut wiring = AutoNCP::new(16, 2, 0.5, 42).unwrap();
//! let cfc = CfC::<NdArray<f32>>::with_wiring(3, &mut wiring, CfcMode::Default, &device).unwrap();
//!
//! let input = Tensor::zeros([4, 10, 3], &device);
//! let (output, state) = cfc.forward(input, None, None);
//! assert_eq!(output.dims(), [4, 10, 2]);
//! assert_eq!(state.dims(), [4, 16]);
//! ```

pub mod cfc;
pub mod ltc;

pub use cfc::CfC;
pub use ltc::LTC;
