//! NCP Wiring Example
//!
//! Builds AutoNCP and custom NCP circuits, runs them through wired CfC and
//! LTC layers and exports the circuit as Graphviz DOT.
//!
//! Run with `cargo run --example ncp_wiring`, then render with
//! `dot -Tpng output/ncp_wiring/wiring.dot -o wiring.png`.

use std::path::Path;

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use ncps_demos::cells::CfcMode;
use ncps_demos::report::write_wiring_dot;
use ncps_demos::rnn::{CfC, LTC};
use ncps_demos::wirings::{AutoNCP, NeuronType, Wiring, NCP};

fn main() -> ncps_demos::Result<()> {
    println!("=== NCP Wiring Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    // Example 1: AutoNCP derives the layer sizes from units, outputs and sparsity
    println!("Example 1: AutoNCP wiring with a wired CfC");
    let mut wiring = AutoNCP::new(64, 8, 0.65, 22222)?;
    let cfc = CfC::<Backend>::with_wiring(16, &mut wiring, CfcMode::Default, &device)?;

    let input = Tensor::<Backend, 3>::random([2, 20, 16], Distribution::Uniform(-1.0, 1.0), &device);
    let (output, state) = cfc.forward(input, None, None);

    for layer in 0..wiring.num_layers() {
        let neurons = wiring.neurons_of_layer(layer);
        let kind = wiring.neuron_type(neurons[0]);
        println!("  layer {}: {} {} neurons", layer, neurons.len(), kind);
    }
    println!("  Output shape: {:?} (motor neurons only)", output.dims());
    println!("  State shape:  {:?}", state.dims());
    println!();

    // Example 2: every layer size given explicitly
    println!("Example 2: Custom NCP with an LTC");
    let mut custom = NCP::new(12, 8, 4, 5, 4, 3, 4, 12345)?;
    let ltc = LTC::<Backend>::new(20, &mut custom, &device)?;

    let input = Tensor::<Backend, 3>::random([4, 15, 20], Distribution::Uniform(0.0, 1.0), &device);
    let timespans = Tensor::<Backend, 2>::random([4, 15], Distribution::Uniform(0.5, 1.5), &device);
    let (output, _) = ltc.forward(input, None, Some(timespans));

    println!("  Sensory synapses:  {}", custom.sensory_synapse_count());
    println!("  Internal synapses: {}", custom.synapse_count());
    println!("  Output shape: {:?}", output.dims());
    println!();

    // Example 3: sparsity of AutoNCP for different motor sizes
    println!("Example 3: Connectivity comparison");
    for motor_size in [2, 4, 8, 16] {
        let mut wiring = AutoNCP::new(64, motor_size, 0.5, 42)?;
        wiring.build(16)?;
        let motor = (0..wiring.units())
            .filter(|&n| wiring.neuron_type(n) == NeuronType::Motor)
            .count();
        println!(
            "  NCP(64 total, {} motor): {} internal synapses",
            motor,
            wiring.synapse_count()
        );
    }
    println!();

    let path = Path::new("output").join("ncp_wiring").join("wiring.dot");
    write_wiring_dot(&path, &wiring)?;
    println!("Wiring of example 1 written to {}", path.display());

    println!("\n=== NCP Examples completed! ===");
    Ok(())
}
