use ndarray::Array2;
use rand::prelude::*;

use super::base::{check_conflicting_build, random_polarity, set_synapse, Wiring};
use super::{matrix_to_rows, rows_to_matrix, WiringConfig};
use crate::error::{NcpsError, Result};

/// Random sparse wiring: a `1 - sparsity_level` fraction of all possible
/// synapses is kept.
#[derive(Clone, Debug)]
pub struct Random {
    units: usize,
    output_dim: usize,
    adjacency_matrix: Array2<i32>,
    sensory_adjacency_matrix: Option<Array2<i32>>,
    input_dim: Option<usize>,
    sparsity_level: f64,
    seed: u64,
}

fn sample_synapses(
    rows: usize,
    cols: usize,
    sparsity_level: f64,
    rng: &mut StdRng,
) -> Array2<i32> {
    let total_possible = rows * cols;
    let num_synapses = (total_possible as f64 * (1.0 - sparsity_level)).round() as usize;
    let all_synapses: Vec<(usize, usize)> = (0..rows)
        .flat_map(|src| (0..cols).map(move |dest| (src, dest)))
        .collect();
    let selected: Vec<(usize, usize)> = all_synapses
        .choose_multiple(rng, num_synapses)
        .cloned()
        .collect();

    let mut matrix = Array2::zeros((rows, cols));
    for (src, dest) in selected {
        matrix[[src, dest]] = random_polarity(rng);
    }
    matrix
}

impl Random {
    pub fn new(
        units: usize,
        output_dim: Option<usize>,
        sparsity_level: f64,
        seed: u64,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&sparsity_level) {
            return Err(NcpsError::wiring(format!(
                "Sparsity level must be in range [0, 1), got {}",
                sparsity_level
            )));
        }
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

        let mut rng = StdRng::seed_from_u64(seed);
        let adjacency_matrix = sample_synapses(units, units, sparsity_level, &mut rng);

        Ok(Self {
            units,
            output_dim,
            adjacency_matrix,
            sensory_adjacency_matrix: None,
            input_dim: None,
            sparsity_level,
            seed,
        })
    }

    pub fn from_config(config: WiringConfig) -> Result<Self> {
        let units = config.units;
        let mut wiring = Self::new(
            units,
            config.output_dim,
            config.sparsity_level.unwrap_or(0.5),
            config.seed.unwrap_or(1111),
        )?;
        if let Some(rows) = config.adjacency_matrix {
            wiring.adjacency_matrix = rows_to_matrix(rows, (units, units))?;
        }
        if let Some(input_dim) = config.input_dim {
            match config.sensory_adjacency_matrix {
                Some(rows) => {
                    wiring.sensory_adjacency_matrix =
                        Some(rows_to_matrix(rows, (input_dim, units))?);
                    wiring.input_dim = Some(input_dim);
                }
                None => wiring.build(input_dim)?,
            }
        }
        Ok(wiring)
    }

    pub fn sparsity_level(&self) -> f64 {
        self.sparsity_level
    }
}

impl Wiring for Random {
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
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        self.sensory_adjacency_matrix = Some(sample_synapses(
            input_dim,
            self.units,
            self.sparsity_level,
            &mut rng,
        ));
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
            kind: "random".to_string(),
            units: self.units,
            adjacency_matrix: Some(matrix_to_rows(&self.adjacency_matrix)),
            sensory_adjacency_matrix: self.sensory_adjacency_matrix.as_ref().map(matrix_to_rows),
            input_dim: self.input_dim,
            output_dim: Some(self.output_dim),
            sparsity_level: Some(self.sparsity_level),
            seed: Some(self.seed),
            ..Default::default()
        }
    }
}
