//! Synthetic sequence data
//!
//! Two generators are provided:
//!
//! - [`SineTask`]: a single long sequence of `[sin(x), cos(x)]` inputs whose
//!   target is a sine of twice the frequency, with jittered time deltas.
//! - [`SequenceSumTask`]: many short random normal sequences whose target is
//!   the sum over time of every feature.
//!
//! Both produce a [`SequenceBatch`], stored as `ndarray` arrays and turned into
//! `burn` tensors on demand.

use std::f32::consts::PI;

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{s, Array2, Array3, Axis};
use rand::prelude::*;
use rand_distr::{Distribution, StandardNormal, Uniform};

use crate::error::{NcpsError, Result};

/// `n` evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: f32, end: f32, n: usize) -> Vec<f32> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f32;
            (0..n).map(|i| start + step * i as f32).collect()
        }
    }
}

/// Inputs, per-step elapsed times and targets of a set of sequences.
///
/// Targets are `[batch, seq, out]` for sequence-to-sequence tasks and
/// `[batch, 1, out]` when only the final value is predicted.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatch {
    pub inputs: Array3<f32>,
    pub time_deltas: Array2<f32>,
    pub targets: Array3<f32>,
}

impl SequenceBatch {
    pub fn new(inputs: Array3<f32>, time_deltas: Array2<f32>, targets: Array3<f32>) -> Result<Self> {
        let (batch, seq, features) = inputs.dim();
        if batch == 0 || seq == 0 || features == 0 {
            return Err(NcpsError::shape(format!(
                "inputs must be non-empty, got {:?}",
                inputs.shape()
            )));
        }
        if time_deltas.dim() != (batch, seq) {
            return Err(NcpsError::shape(format!(
                "time deltas must be [{}, {}], got {:?}",
                batch,
                seq,
                time_deltas.shape()
            )));
        }
        let (target_batch, target_seq, target_features) = targets.dim();
        if target_batch != batch || target_features == 0 || (target_seq != seq && target_seq != 1) {
            return Err(NcpsError::shape(format!(
                "targets must be [{}, {} or 1, out], got {:?}",
                batch,
                seq,
                targets.shape()
            )));
        }
        Ok(Self {
            inputs,
            time_deltas,
            targets,
        })
    }

    /// Number of sequences
    pub fn len(&self) -> usize {
        self.inputs.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seq_len(&self) -> usize {
        self.inputs.dim().1
    }

    pub fn input_dim(&self) -> usize {
        self.inputs.dim().2
    }

    pub fn output_dim(&self) -> usize {
        self.targets.dim().2
    }

    /// Whether only the last step of each sequence has a target
    pub fn has_final_targets(&self) -> bool {
        self.targets.dim().1 == 1 && self.seq_len() > 1
    }

    /// Sequences `start..start + len`.
    pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
        if len == 0 || start + len > self.len() {
            return Err(NcpsError::shape(format!(
                "cannot take {} sequences from {} of {}",
                len,
                start,
                self.len()
            )));
        }
        let range = start..start + len;
        Ok(Self {
            inputs: self.inputs.slice(s![range.clone(), .., ..]).to_owned(),
            time_deltas: self.time_deltas.slice(s![range.clone(), ..]).to_owned(),
            targets: self.targets.slice(s![range, .., ..]).to_owned(),
        })
    }

    /// Consecutive mini-batches of at most `batch_size` sequences.
    pub fn batches(&self, batch_size: usize) -> Result<Vec<Self>> {
        if batch_size == 0 {
            return Err(NcpsError::config("batch size must be positive"));
        }
        (0..self.len())
            .step_by(batch_size)
            .map(|start| self.slice(start, batch_size.min(self.len() - start)))
            .collect()
    }

    /// `(inputs, time_deltas, targets)` as tensors on `device`.
    pub fn to_tensors<B: Backend>(
        &self,
        device: &B::Device,
    ) -> (Tensor<B, 3>, Tensor<B, 2>, Tensor<B, 3>) {
        (
            array3_to_tensor(&self.inputs, device),
            array2_to_tensor(&self.time_deltas, device),
            array3_to_tensor(&self.targets, device),
        )
    }

    /// Targets of the first sequence, flattened over time and features.
    pub fn first_targets(&self) -> Vec<f32> {
        self.targets.index_axis(Axis(0), 0).iter().copied().collect()
    }
}

fn array3_to_tensor<B: Backend>(arr: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (a, b, c) = arr.dim();
    let data: Vec<f32> = arr.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [a, b, c]), device)
}

fn array2_to_tensor<B: Backend>(arr: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (a, b) = arr.dim();
    let data: Vec<f32> = arr.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [a, b]), device)
}

/// Sine regression over one long sequence.
pub struct SineTask;

impl SineTask {
    pub const INPUT_DIM: usize = 2;
    pub const OUTPUT_DIM: usize = 1;

    /// Inputs `[1, len, 2] = [sin(x), cos(x)]` for `x` over `[0, 3π]`, target
    /// `[1, len, 1] = sin` over `[0, 6π]`, time deltas in `[0.9, 1.1]`.
    pub fn generate(len: usize, seed: u64) -> Result<SequenceBatch> {
        if len == 0 {
            return Err(NcpsError::shape("sequence length must be positive"));
        }
        let x = linspace(0.0, 3.0 * PI, len);
        let y = linspace(0.0, 6.0 * PI, len);

        let mut inputs = Array3::zeros((1, len, Self::INPUT_DIM));
        let mut targets = Array3::zeros((1, len, Self::OUTPUT_DIM));
        for (t, (&xi, &yi)) in x.iter().zip(y.iter()).enumerate() {
            inputs[[0, t, 0]] = xi.sin();
            inputs[[0, t, 1]] = xi.cos();
            targets[[0, t, 0]] = yi.sin();
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let jitter = Uniform::new_inclusive(0.9f32, 1.1f32);
        let time_deltas =
            Array2::from_shape_fn((1, len), |_| jitter.sample(&mut rng).clamp(0.9, 1.1));

        SequenceBatch::new(inputs, time_deltas, targets)
    }
}

/// Random sequences whose target is the per-feature sum over time.
pub struct SequenceSumTask;

impl SequenceSumTask {
    /// Inputs `N(0, 1)` of shape `[num_samples, seq_len, input_dim]`, time
    /// deltas `U(0.1, 1.0)`, targets `[num_samples, 1, input_dim]`.
    pub fn generate(
        num_samples: usize,
        seq_len: usize,
        input_dim: usize,
        seed: u64,
    ) -> Result<SequenceBatch> {
        if num_samples == 0 || seq_len == 0 || input_dim == 0 {
            return Err(NcpsError::shape(format!(
                "invalid sequence-sum shape [{}, {}, {}]",
                num_samples, seq_len, input_dim
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);

        let inputs: Array3<f32> = Array3::from_shape_fn((num_samples, seq_len, input_dim), |_| {
            StandardNormal.sample(&mut rng)
        });
        let delta = Uniform::new(0.1f32, 1.0f32);
        let time_deltas = Array2::from_shape_fn((num_samples, seq_len), |_| delta.sample(&mut rng));
        let targets = inputs.sum_axis(Axis(1)).insert_axis(Axis(1));

        SequenceBatch::new(inputs, time_deltas, targets)
    }
}
