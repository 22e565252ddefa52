//! Connectivity topologies for wired cells.
//!
//! A wiring owns two adjacency matrices with entries in `{-1, 0, 1}`:
//! `adjacency_matrix [units, units]` for neuron-to-neuron synapses and
//! `sensory_adjacency_matrix [input_dim, units]` for input-to-neuron synapses.
//! The sensory matrix only exists once [`Wiring::build`] has been called.

use serde::{Deserialize, Serialize};

mod base;
mod ncp;
mod random;

pub use base::{FullyConnected, NeuronType, Wiring};
pub use ncp::{AutoNCP, NCP};
pub use random::Random;

/// Serializable description of a wiring.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WiringConfig {
    pub kind: String,
    pub units: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_matrix: Option<Vec<Vec<i32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensory_adjacency_matrix: Option<Vec<Vec<i32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_connections: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inter_neurons: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_command_neurons: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_motor_neurons: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensory_fanout: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_fanout: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent_command_synapses: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor_fanin: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparsity_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

pub(crate) fn matrix_to_rows(matrix: &ndarray::Array2<i32>) -> Vec<Vec<i32>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

pub(crate) fn rows_to_matrix(
    rows: Vec<Vec<i32>>,
    shape: (usize, usize),
) -> crate::Result<ndarray::Array2<i32>> {
    let flat: Vec<i32> = rows.into_iter().flatten().collect();
    ndarray::Array2::from_shape_vec(shape, flat).map_err(|e| {
        crate::NcpsError::wiring(format!(
            "adjacency matrix does not match shape {:?}: {}",
            shape, e
        ))
    })
}
