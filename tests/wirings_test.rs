//! Tests for the wirings module

use ncps_demos::wirings::*;

#[test]
fn test_fully_connected_creation() {
    let fc = FullyConnected::new(10, None, 1234, true).unwrap();
    assert_eq!(fc.units(), 10);
    assert_eq!(fc.output_dim(), Some(10));
    assert!(!fc.is_built());
    assert_eq!(fc.synapse_count(), 100);
}

#[test]
fn test_fully_connected_build() {
    let mut fc = FullyConnected::new(10, Some(5), 1234, true).unwrap();
    fc.build(20).unwrap();
    assert!(fc.is_built());
    assert_eq!(fc.input_dim(), Some(20));

    let sensory = fc.sensory_adjacency_matrix().unwrap();
    assert_eq!(sensory.shape(), &[20, 10]);
    assert_eq!(fc.sensory_synapse_count(), 200);

    // Rebuilding with the same dimension is a no-op
    fc.build(20).unwrap();
}

#[test]
fn test_fully_connected_without_self_connections() {
    let fc = FullyConnected::new(6, None, 1, false).unwrap();
    for i in 0..6 {
        assert_eq!(fc.adjacency_matrix()[[i, i]], 0);
    }
    assert_eq!(fc.synapse_count(), 30);
}

#[test]
fn test_fully_connected_config_restores_wiring() {
    let mut fc = FullyConnected::new(10, Some(5), 1234, true).unwrap();
    fc.build(20).unwrap();

    let json = serde_json::to_string(&fc.config()).unwrap();
    let config: WiringConfig = serde_json::from_str(&json).unwrap();
    let restored = FullyConnected::from_config(config).unwrap();

    assert_eq!(restored.units(), fc.units());
    assert_eq!(restored.input_dim(), fc.input_dim());
    assert_eq!(restored.output_dim(), fc.output_dim());
    assert_eq!(restored.adjacency_matrix(), fc.adjacency_matrix());
    assert_eq!(restored.sensory_adjacency_matrix(), fc.sensory_adjacency_matrix());
}

#[test]
fn test_conflicting_input_dim() {
    let mut fc = FullyConnected::new(10, None, 1234, true).unwrap();
    fc.build(20).unwrap();
    assert!(fc.build(30).is_err());
    assert_eq!(fc.input_dim(), Some(20));
}

#[test]
fn test_ncp_structure() {
    let ncp = NCP::new(
        10,    // inter_neurons
        8,     // command_neurons
        5,     // motor_neurons
        6,     // sensory_fanout
        6,     // inter_fanout
        4,     // recurrent_command_synapses
        6,     // motor_fanin
        22222, // seed
    )
    .unwrap();

    assert_eq!(ncp.units(), 23);
    assert_eq!(ncp.output_dim(), Some(5));
    assert_eq!(ncp.num_layers(), 3);
    assert_eq!(ncp.neurons_of_layer(0).len(), 10);
    assert_eq!(ncp.neurons_of_layer(1).len(), 8);
    assert_eq!(ncp.neurons_of_layer(2).len(), 5);
}

#[test]
fn test_ncp_neuron_types() {
    let ncp = NCP::new(10, 8, 5, 6, 6, 4, 6, 22222).unwrap();

    assert_eq!(ncp.neuron_type(0), NeuronType::Motor);
    assert_eq!(ncp.neuron_type(4), NeuronType::Motor);
    assert_eq!(ncp.neuron_type(5), NeuronType::Command);
    assert_eq!(ncp.neuron_type(12), NeuronType::Command);
    assert_eq!(ncp.neuron_type(13), NeuronType::Inter);
    assert_eq!(ncp.neuron_type(13).to_string(), "inter");
}

#[test]
fn test_ncp_build_only_feeds_inter_neurons() {
    let mut ncp = NCP::new(10, 8, 5, 6, 6, 4, 6, 22222).unwrap();
    ncp.build(15).unwrap();

    assert!(ncp.is_built());
    let sensory = ncp.sensory_adjacency_matrix().unwrap();
    for ((_, dest), &polarity) in sensory.indexed_iter() {
        if polarity != 0 {
            assert_eq!(ncp.neuron_type(dest), NeuronType::Inter);
        }
    }
    assert!(ncp.sensory_synapse_count() >= 15);
}

#[test]
fn test_ncp_invalid_fanout() {
    // sensory_fanout larger than the inter layer
    assert!(NCP::new(4, 8, 5, 6, 2, 2, 2, 1).is_err());
    assert!(NCP::new(0, 8, 5, 1, 2, 2, 2, 1).is_err());
}

#[test]
fn test_ncp_is_deterministic_for_a_seed() {
    let mut a = NCP::new(10, 8, 5, 6, 6, 4, 6, 7).unwrap();
    let mut b = NCP::new(10, 8, 5, 6, 6, 4, 6, 7).unwrap();
    a.build(4).unwrap();
    b.build(4).unwrap();
    assert_eq!(a.adjacency_matrix(), b.adjacency_matrix());
    assert_eq!(a.sensory_adjacency_matrix(), b.sensory_adjacency_matrix());
}

#[test]
fn test_auto_ncp_convenience() {
    let auto_ncp = AutoNCP::new(32, 8, 0.5, 22222).unwrap();

    assert_eq!(auto_ncp.units(), 32);
    assert_eq!(auto_ncp.output_dim(), Some(8));
    assert_eq!(auto_ncp.num_layers(), 3);
    // 40% of the 24 non-motor neurons, rounded up, are command neurons
    assert_eq!(auto_ncp.neurons_of_layer(1).len(), 10);
    assert_eq!(auto_ncp.neurons_of_layer(0).len(), 14);
}

#[test]
fn test_auto_ncp_invalid_parameters() {
    assert!(AutoNCP::new(32, 8, 1.5, 22222).is_err());
    assert!(AutoNCP::new(10, 8, 0.5, 22222).is_err());
    assert!(AutoNCP::new(10, 0, 0.5, 22222).is_err());
}

#[test]
fn test_random_wiring() {
    let mut random = Random::new(10, Some(5), 0.5, 1234).unwrap();
    random.build(20).unwrap();

    assert_eq!(random.units(), 10);
    assert_eq!(random.synapse_count(), 50);
    assert_eq!(random.sensory_synapse_count(), 100);
}

#[test]
fn test_add_synapse() {
    let mut fc = FullyConnected::new(10, None, 1234, true).unwrap();

    fc.add_synapse(0, 1, 1).unwrap();
    assert_eq!(fc.adjacency_matrix()[[0, 1]], 1);

    fc.add_synapse(2, 3, -1).unwrap();
    assert_eq!(fc.adjacency_matrix()[[2, 3]], -1);
}

#[test]
fn test_add_synapse_errors() {
    let mut fc = FullyConnected::new(10, None, 1234, true).unwrap();
    assert!(fc.add_synapse(0, 1, 2).is_err());
    assert!(fc.add_synapse(0, 15, 1).is_err());
    // No sensory matrix before build
    assert!(fc.add_sensory_synapse(0, 1, 1).is_err());

    fc.build(3).unwrap();
    fc.add_sensory_synapse(2, 9, -1).unwrap();
    assert_eq!(fc.sensory_adjacency_matrix().unwrap()[[2, 9]], -1);
}
