use ndarray::Array2;
use rand::prelude::*;

use super::base::{check_conflicting_build, set_synapse, NeuronType, Wiring};
use super::{matrix_to_rows, rows_to_matrix, WiringConfig};
use crate::error::{NcpsError, Result};

/// Neural Circuit Policy wiring
///
/// Sensory inputs feed inter neurons, inter neurons feed command neurons
/// (which also carry recurrent synapses among themselves), and command neurons
/// feed motor neurons. Neuron ids are laid out as `[motor | command | inter]`
/// so the first `output_dim` state entries are the motor readout.
#[derive(Clone, Debug)]
pub struct NCP {
    units: usize,
    adjacency_matrix: Array2<i32>,
    sensory_adjacency_matrix: Option<Array2<i32>>,
    input_dim: Option<usize>,
    num_inter_neurons: usize,
    num_command_neurons: usize,
    num_motor_neurons: usize,
    sensory_fanout: usize,
    inter_fanout: usize,
    recurrent_command_synapses: usize,
    motor_fanin: usize,
    seed: u64,
}

fn random_sign(rng: &mut StdRng) -> i32 {
    if rng.gen::<bool>() {
        1
    } else {
        -1
    }
}

impl NCP {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inter_neurons: usize,
        command_neurons: usize,
        motor_neurons: usize,
        sensory_fanout: usize,
        inter_fanout: usize,
        recurrent_command_synapses: usize,
        motor_fanin: usize,
        seed: u64,
    ) -> Result<Self> {
        if inter_neurons == 0 || command_neurons == 0 || motor_neurons == 0 {
            return Err(NcpsError::wiring(format!(
                "every NCP layer needs neurons (inter={}, command={}, motor={})",
                inter_neurons, command_neurons, motor_neurons
            )));
        }
        if motor_fanin == 0 || motor_fanin > command_neurons {
            return Err(NcpsError::wiring(format!(
                "Motor fanin {} must be in 1..={} (number of command neurons)",
                motor_fanin, command_neurons
            )));
        }
        if sensory_fanout == 0 || sensory_fanout > inter_neurons {
            return Err(NcpsError::wiring(format!(
                "Sensory fanout {} must be in 1..={} (number of inter neurons)",
                sensory_fanout, inter_neurons
            )));
        }
        if inter_fanout == 0 || inter_fanout > command_neurons {
            return Err(NcpsError::wiring(format!(
                "Inter fanout {} must be in 1..={} (number of command neurons)",
                inter_fanout, command_neurons
            )));
        }

        let units = inter_neurons + command_neurons + motor_neurons;
        Ok(Self {
            units,
            adjacency_matrix: Array2::zeros((units, units)),
            sensory_adjacency_matrix: None,
            input_dim: None,
            num_inter_neurons: inter_neurons,
            num_command_neurons: command_neurons,
            num_motor_neurons: motor_neurons,
            sensory_fanout,
            inter_fanout,
            recurrent_command_synapses,
            motor_fanin,
            seed,
        })
    }

    pub fn from_config(config: WiringConfig) -> Result<Self> {
        let missing = |field: &str| NcpsError::wiring(format!("NCP config is missing `{}`", field));
        let mut ncp = Self::new(
            config.num_inter_neurons.ok_or_else(|| missing("num_inter_neurons"))?,
            config.num_command_neurons.ok_or_else(|| missing("num_command_neurons"))?,
            config.num_motor_neurons.ok_or_else(|| missing("num_motor_neurons"))?,
            config.sensory_fanout.ok_or_else(|| missing("sensory_fanout"))?,
            config.inter_fanout.ok_or_else(|| missing("inter_fanout"))?,
            config
                .recurrent_command_synapses
                .ok_or_else(|| missing("recurrent_command_synapses"))?,
            config.motor_fanin.ok_or_else(|| missing("motor_fanin"))?,
            config.seed.unwrap_or(22222),
        )?;
        if config.units != ncp.units {
            return Err(NcpsError::wiring(format!(
                "NCP config declares {} units but its layers sum to {}",
                config.units, ncp.units
            )));
        }

        match (config.adjacency_matrix, config.sensory_adjacency_matrix) {
            (Some(adjacency), Some(sensory)) => {
                let input_dim = config.input_dim.ok_or_else(|| missing("input_dim"))?;
                ncp.adjacency_matrix = rows_to_matrix(adjacency, (ncp.units, ncp.units))?;
                ncp.sensory_adjacency_matrix =
                    Some(rows_to_matrix(sensory, (input_dim, ncp.units))?);
                ncp.input_dim = Some(input_dim);
            }
            _ => {
                if let Some(input_dim) = config.input_dim {
                    ncp.build(input_dim)?;
                }
            }
        }
        Ok(ncp)
    }

    pub fn motor_neurons(&self) -> Vec<usize> {
        (0..self.num_motor_neurons).collect()
    }

    pub fn command_neurons(&self) -> Vec<usize> {
        let start = self.num_motor_neurons;
        (start..start + self.num_command_neurons).collect()
    }

    pub fn inter_neurons(&self) -> Vec<usize> {
        (self.num_motor_neurons + self.num_command_neurons..self.units).collect()
    }

    fn build_sensory_to_inter_layer(&mut self, rng: &mut StdRng) -> Result<()> {
        let input_dim = self.input_dim.unwrap_or(0);
        let inter_neurons = self.inter_neurons();
        let mut unreachable_inter = inter_neurons.clone();

        for src in 0..input_dim {
            let selected: Vec<usize> = inter_neurons
                .choose_multiple(rng, self.sensory_fanout)
                .cloned()
                .collect();
            for dest in selected {
                unreachable_inter.retain(|&n| n != dest);
                let polarity = random_sign(rng);
                self.add_sensory_synapse(src, dest, polarity)?;
            }
        }

        // Every inter neuron must receive at least one sensory synapse.
        let mean_inter_fanin = (input_dim * self.sensory_fanout / self.num_inter_neurons)
            .max(1)
            .min(input_dim);
        let sensory: Vec<usize> = (0..input_dim).collect();
        for dest in unreachable_inter {
            let selected: Vec<usize> = sensory
                .choose_multiple(rng, mean_inter_fanin)
                .cloned()
                .collect();
            for src in selected {
                let polarity = random_sign(rng);
                self.add_sensory_synapse(src, dest, polarity)?;
            }
        }
        Ok(())
    }

    fn build_inter_to_command_layer(&mut self, rng: &mut StdRng) -> Result<()> {
        let inter_neurons = self.inter_neurons();
        let command_neurons = self.command_neurons();
        let mut unreachable_command = command_neurons.clone();

        for &src in &inter_neurons {
            let selected: Vec<usize> = command_neurons
                .choose_multiple(rng, self.inter_fanout)
                .cloned()
                .collect();
            for dest in selected {
                unreachable_command.retain(|&n| n != dest);
                let polarity = random_sign(rng);
                self.add_synapse(src, dest, polarity)?;
            }
        }

        let mean_command_fanin = (self.num_inter_neurons * self.inter_fanout
            / self.num_command_neurons)
            .max(1)
            .min(self.num_inter_neurons);
        for dest in unreachable_command {
            let selected: Vec<usize> = inter_neurons
                .choose_multiple(rng, mean_command_fanin)
                .cloned()
                .collect();
            for src in selected {
                let polarity = random_sign(rng);
                self.add_synapse(src, dest, polarity)?;
            }
        }
        Ok(())
    }

    fn build_recurrent_command_layer(&mut self, rng: &mut StdRng) -> Result<()> {
        let command_neurons = self.command_neurons();
        for _ in 0..self.recurrent_command_synapses {
            let (Some(&src), Some(&dest)) =
                (command_neurons.choose(rng), command_neurons.choose(rng))
            else {
                break;
            };
            let polarity = random_sign(rng);
            self.add_synapse(src, dest, polarity)?;
        }
        Ok(())
    }

    fn build_command_to_motor_layer(&mut self, rng: &mut StdRng) -> Result<()> {
        let motor_neurons = self.motor_neurons();
        let command_neurons = self.command_neurons();
        let mut unreachable_command = command_neurons.clone();

        for &dest in &motor_neurons {
            let selected: Vec<usize> = command_neurons
                .choose_multiple(rng, self.motor_fanin)
                .cloned()
                .collect();
            for src in selected {
                unreachable_command.retain(|&n| n != src);
                let polarity = random_sign(rng);
                self.add_synapse(src, dest, polarity)?;
            }
        }

        // Every command neuron must drive at least one motor neuron.
        let mean_command_fanout = (self.num_motor_neurons * self.motor_fanin
            / self.num_command_neurons)
            .max(1)
            .min(self.num_motor_neurons);
        for src in unreachable_command {
            let selected: Vec<usize> = motor_neurons
                .choose_multiple(rng, mean_command_fanout)
                .cloned()
                .collect();
            for dest in selected {
                let polarity = random_sign(rng);
                self.add_synapse(src, dest, polarity)?;
            }
        }
        Ok(())
    }
}

impl Wiring for NCP {
    fn units(&self) -> usize {
        self.units
    }

    fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    fn output_dim(&self) -> Option<usize> {
        Some(self.num_motor_neurons)
    }

    fn num_layers(&self) -> usize {
        3
    }

    fn neurons_of_layer(&self, layer_id: usize) -> Vec<usize> {
        match layer_id {
            0 => self.inter_neurons(),
            1 => self.command_neurons(),
            2 => self.motor_neurons(),
            _ => vec![],
        }
    }

    fn neuron_type(&self, neuron_id: usize) -> NeuronType {
        if neuron_id < self.num_motor_neurons {
            NeuronType::Motor
        } else if neuron_id < self.num_motor_neurons + self.num_command_neurons {
            NeuronType::Command
        } else {
            NeuronType::Inter
        }
    }

    fn build(&mut self, input_dim: usize) -> Result<()> {
        if check_conflicting_build(self.input_dim, input_dim)? {
            return Ok(());
        }

        self.input_dim = Some(input_dim);
        self.sensory_adjacency_matrix = Some(Array2::zeros((input_dim, self.units)));
        self.adjacency_matrix = Array2::zeros((self.units, self.units));

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.build_sensory_to_inter_layer(&mut rng)?;
        self.build_inter_to_command_layer(&mut rng)?;
        self.build_recurrent_command_layer(&mut rng)?;
        self.build_command_to_motor_layer(&mut rng)
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
            kind: "ncp".to_string(),
            units: self.units,
            adjacency_matrix: Some(matrix_to_rows(&self.adjacency_matrix)),
            sensory_adjacency_matrix: self.sensory_adjacency_matrix.as_ref().map(matrix_to_rows),
            input_dim: self.input_dim,
            output_dim: Some(self.num_motor_neurons),
            num_inter_neurons: Some(self.num_inter_neurons),
            num_command_neurons: Some(self.num_command_neurons),
            num_motor_neurons: Some(self.num_motor_neurons),
            sensory_fanout: Some(self.sensory_fanout),
            inter_fanout: Some(self.inter_fanout),
            recurrent_command_synapses: Some(self.recurrent_command_synapses),
            motor_fanin: Some(self.motor_fanin),
            seed: Some(self.seed),
            ..Default::default()
        }
    }
}

/// NCP wiring sized from a total unit count, an output count and a sparsity level
#[derive(Clone, Debug)]
pub struct AutoNCP {
    ncp: NCP,
    output_size: usize,
    sparsity_level: f64,
    seed: u64,
}

impl AutoNCP {
    pub fn new(units: usize, output_size: usize, sparsity_level: f64, seed: u64) -> Result<Self> {
        if output_size == 0 || output_size + 2 >= units {
            return Err(NcpsError::wiring(format!(
                "Output size {} must be in 1..{} (units - 2)",
                output_size,
                units.saturating_sub(2)
            )));
        }
        if !(0.0..=0.9).contains(&sparsity_level) {
            return Err(NcpsError::wiring(format!(
                "Sparsity level must be between 0.0 and 0.9, got {}",
                sparsity_level
            )));
        }

        let density_level = 1.0 - sparsity_level;
        let inter_and_command_neurons = units - output_size;
        let command_neurons = ((inter_and_command_neurons as f64 * 0.4).ceil() as usize).max(1);
        let inter_neurons = inter_and_command_neurons - command_neurons;

        let sensory_fanout = ((inter_neurons as f64 * density_level).ceil() as usize).max(1);
        let inter_fanout = ((command_neurons as f64 * density_level).ceil() as usize).max(1);
        let recurrent_command_synapses =
            ((command_neurons as f64 * density_level * 2.0).ceil() as usize).max(1);
        let motor_fanin = ((command_neurons as f64 * density_level).ceil() as usize).max(1);

        let ncp = NCP::new(
            inter_neurons,
            command_neurons,
            output_size,
            sensory_fanout,
            inter_fanout,
            recurrent_command_synapses,
            motor_fanin,
            seed,
        )?;

        Ok(Self {
            ncp,
            output_size,
            sparsity_level,
            seed,
        })
    }

    pub fn sparsity_level(&self) -> f64 {
        self.sparsity_level
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Wiring for AutoNCP {
    fn units(&self) -> usize {
        self.ncp.units()
    }

    fn input_dim(&self) -> Option<usize> {
        self.ncp.input_dim()
    }

    fn output_dim(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn num_layers(&self) -> usize {
        self.ncp.num_layers()
    }

    fn neurons_of_layer(&self, layer_id: usize) -> Vec<usize> {
        self.ncp.neurons_of_layer(layer_id)
    }

    fn neuron_type(&self, neuron_id: usize) -> NeuronType {
        self.ncp.neuron_type(neuron_id)
    }

    fn build(&mut self, input_dim: usize) -> Result<()> {
        self.ncp.build(input_dim)
    }

    fn adjacency_matrix(&self) -> &Array2<i32> {
        self.ncp.adjacency_matrix()
    }

    fn sensory_adjacency_matrix(&self) -> Option<&Array2<i32>> {
        self.ncp.sensory_adjacency_matrix()
    }

    fn add_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()> {
        self.ncp.add_synapse(src, dest, polarity)
    }

    fn add_sensory_synapse(&mut self, src: usize, dest: usize, polarity: i32) -> Result<()> {
        self.ncp.add_sensory_synapse(src, dest, polarity)
    }

    fn config(&self) -> WiringConfig {
        WiringConfig {
            kind: "auto_ncp".to_string(),
            sparsity_level: Some(self.sparsity_level),
            ..self.ncp.config()
        }
    }
}
