use std::fmt;

use ndarray::Array2;
use rand::prelude::*;

use super::{matrix_to_rows, rows_to_matrix, WiringConfig};
use crate::error::{NcpsError, Result};

/// Role of a neuron inside a wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeuronType {
    Motor,
    Command,
    Inter,
}

impl fmt::Display for NeuronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeuronType::Motor => "motor",
            NeuronType::Command => "command",
            NeuronType::Inter => "inter",
        };
        f.write_str(name)
    }
}

/// Base trait for wiring configurations in Neural Circuit Policies
pub trait Wiring: Send + Sync {
    /// Number of neurons in this wiring
    fn units(&self) -> usize;

    /// Number of input features, known after [`Wiring::build`]
    fn input_dim(&self) -> Option<usize>;

    /// Number of motor (output) neurons
    fn output_dim(&self) -> Option<usize>;

    fn num_layers(&self) -> usize {
        1
    }

    /// Neuron ids of a layer, ordered from the sensory side to the motor side
    fn neurons_of_layer(&self, layer_id: usize) -> Vec<usize> {
        if layer_id == 0 {
            (0..self.units()).collect()
        } else {
            vec![]
        }
    }

    fn is_built(&self) -> bool {
        self.input_dim().is_some()
    }

    /// Creates the sensory synapses for `input_dim` input features.
    ///
    /// Building twice with the same dimension is a no-op; a different
    /// dimension is an error.
    fn build(&mut self, input_dim: usize) -> Result<()>;

    fn neuron_type(&self, neuron_id: usize) -> NeuronType {
        if neuron_id < self.output_dim().unwrap_or(0) {
            NeuronType::Motor
        } else {
            NeuronType::Inter
        }
    }

    fn adjacency_matrix(&self) -> &Array2<i32>;

    fn sensory_adjacency_matrix(&self) -> Option<&Array2<i32>>;

    fn add_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()>;

    fn add_sensory_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()>;

    fn synapse_count(&self) -> usize {
        self.adjacency_matrix().mapv(|x| x.unsigned_abs() as usize).sum()
    }

    fn sensory_synapse_count(&self) -> usize {
        self.sensory_adjacency_matrix()
            .map(|m| m.mapv(|x| x.unsigned_abs() as usize).sum())
            .unwrap_or(0)
    }

    fn config(&self) -> WiringConfig;
}

pub(crate) fn check_conflicting_build(existing: Option<usize>, input_dim: usize) -> Result<bool> {
    if input_dim == 0 {
        return Err(NcpsError::wiring("input dimension must be positive"));
    }
    match existing {
        Some(dim) if dim != input_dim => Err(NcpsError::wiring(format!(
            "Conflicting input dimensions: expected {}, got {}",
            dim, input_dim
        ))),
        Some(_) => Ok(true),
        None => Ok(false),
    }
}

pub(crate) fn set_synapse(
    matrix: &mut Array2<i32>,
    src: usize,
    dest: usize,
    polarity: i32,
) -> Result<()> {
    let (rows, cols) = matrix.dim();
    if src >= rows || dest >= cols {
        return Err(NcpsError::wiring(format!(
            "Invalid synapse: src={}, dest={}, matrix is {}x{}",
            src, dest, rows, cols
        )));
    }
    if polarity != -1 && polarity != 1 {
        return Err(NcpsError::wiring(format!(
            "Polarity must be -1 or 1, got {}",
            polarity
        )));
    }
    matrix[[src, dest]] = polarity;
    Ok(())
}

/// Roughly one synapse in three is inhibitory.
pub(crate) fn random_polarity(rng: &mut StdRng) -> i32 {
    if rng.gen::<f64>() < 0.33 {
        -1
    } else {
        1
    }
}

/// Every neuron connected to every other neuron
#[derive(Clone, Debug)]
pub struct FullyConnected {
    units: usize,
    output_dim: usize,
    adjacency_matrix: Array2<i32>,
    sensory_adjacency_matrix: Option<Array2<i32>>,
    input_dim: Option<usize>,
    self_connections: bool,
    seed: u64,
}

impl FullyConnected {
    pub fn new(
        units: usize,
        output_dim: Option<usize>,
        seed: u64,
        self_connections: bool,
    ) -> Result<Self> {
        if units == 0 {
            return Err(NcpsError::wiring("a wiring needs at least one unit"));
        }
        let output_dim = output_dim.unwrap_or(units);
        if output_dim == 0 || output_dim > units {
            return Err(NcpsError::wiring(format!(
                "output dimension {} must be in 1..={}",
                output_dim, units
            )));
        }

        let mut adjacency_matrix = Array2::zeros((units, units));
        let mut rng = StdRng::seed_from_u64(seed);
        for src in 0..units {
            for dest in 0..units {
                if src == dest && !self_connections {
                    continue;
                }
                adjacency_matrix[[src, dest]] = random_polarity(&mut rng);
            }
        }

        Ok(Self {
            units,
            output_dim,
            adjacency_matrix,
            sensory_adjacency_matrix: None,
            input_dim: None,
            self_connections,
            seed,
        })
    }

    pub fn from_config(config: WiringConfig) -> Result<Self> {
        let units = config.units;
        let mut wiring = Self::new(
            units,
            config.output_dim,
            config.seed.unwrap_or(1111),
            config.self_connections.unwrap_or(true),
        )?;
        if let Some(rows) = config.adjacency_matrix {
            wiring.adjacency_matrix = rows_to_matrix(rows, (units, units))?;
        }
        if let Some(rows) = config.sensory_adjacency_matrix {
            let input_dim = config.input_dim.ok_or_else(|| {
                NcpsError::wiring("input_dim is required when a sensory matrix is present")
            })?;
            wiring.sensory_adjacency_matrix = Some(rows_to_matrix(rows, (input_dim, units))?);
            wiring.input_dim = Some(input_dim);
        }
        Ok(wiring)
    }
}

impl Wiring for FullyConnected {
    fn units(&self) -> usize {
        self.units
    }

    fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    fn output_dim(&self) -> Option<usize> {
        Some(self.output_dim)
    }

    fn build(&mut self, input_dim: usize) -> Result<()> {
        if check_conflicting_build(self.input_dim, input_dim)? {
            return Ok(());
        }

        // Offset keeps sensory polarities independent from the recurrent ones.
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let mut sensory_matrix = Array2::zeros((input_dim, self.units));
        for src in 0..input_dim {
            for dest in 0..self.units {
                sensory_matrix[[src, dest]] = random_polarity(&mut rng);
            }
        }
        self.sensory_adjacency_matrix = Some(sensory_matrix);
        self.input_dim = Some(input_dim);
        Ok(())
    }

    fn adjacency_matrix(&self) -> &Array2<i32> {
        &self.adjacency_matrix
    }

    fn sensory_adjacency_matrix(&self) -> Option<&Array2<i32>> {
        self.sensory_adjacency_matrix.as_ref()
    }

    fn add_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()> {
        set_synapse(&mut self.adjacency_matrix, src, dest, polarity)
    }

    fn add_sensory_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()> {
        let matrix = self
            .sensory_adjacency_matrix
            .as_mut()
            .ok_or_else(|| NcpsError::wiring("build the wiring before adding sensory synapses"))?;
        set_synapse(matrix, src, dest, polarity)
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            kind: "fully_connected".to_string(),
            units: self.units,
            adjacency_matrix: Some(matrix_to_rows(&self.adjacency_matrix)),
            sensory_adjacency_matrix: self.sensory_adjacency_matrix.as_ref().map(matrix_to_rows),
            input_dim: self.input_dim,
            output_dim: Some(self.output_dim),
            self_connections: Some(self.self_connections),
            seed: Some(self.seed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_polarities() {
        let a = FullyConnected::new(8, None, 7, true).unwrap();
        let b = FullyConnected::new(8, None, 7, true).unwrap();
        assert_eq!(a.adjacency_matrix(), b.adjacency_matrix());
    }

    #[test]
    fn test_no_self_connections() {
        let fc = FullyConnected::new(6, None, 1, false).unwrap();
        for i in 0..6 {
            assert_eq!(fc.adjacency_matrix()[[i, i]], 0);
        }
        assert_eq!(fc.synapse_count(), 30);
    }

    #[test]
    fn test_rebuild_same_dim_is_noop() {
        let mut fc = FullyConnected::new(4, None, 1, true).unwrap();
        fc.build(3).unwrap();
        let before = fc.sensory_adjacency_matrix().cloned();
        fc.build(3).unwrap();
        assert_eq!(fc.sensory_adjacency_matrix().cloned(), before);
    }

    #[test]
    fn test_sensory_synapse_before_build() {
        let mut fc = FullyConnected::new(4, None, 1, true).unwrap();
        assert!(fc.add_sensory_synapse(0, 0, 1).is_err());
    }

    #[test]
    fn test_output_dim_bounds() {
        assert!(FullyConnected::new(4, Some(5), 1, true).is_err());
        assert!(FullyConnected::new(0, None, 1, true).is_err());
    }
}
