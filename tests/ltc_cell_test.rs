//! Integration tests for the LTC Cell

use burn::backend::NdArray;
use burn::module::Module;
use burn::tensor::{Distribution, Tensor};
use ncps_demos::cells::{LTCCell, MappingMode};
use ncps_demos::wirings::{AutoNCP, FullyConnected, Wiring, NCP};

type Backend = NdArray<f32>;

fn create_test_cell() -> LTCCell<Backend> {
    let device = Default::default();
    let wiring = FullyConnected::new(10, Some(5), 1234, true).unwrap();

    LTCCell::new(&wiring, Some(8), &device)
        .unwrap()
        .with_ode_unfolds(6)
        .with_epsilon(1e-8)
}

#[test]
fn test_ltc_cell_creation() {
    let cell = create_test_cell();

    assert_eq!(cell.state_size(), 10);
    assert_eq!(cell.motor_size(), 5);
    assert_eq!(cell.sensory_size(), 8);
    assert_eq!(cell.ode_unfolds(), 6);
}

#[test]
fn test_ltc_needs_a_sensory_size() {
    let device = Default::default();
    let wiring = FullyConnected::new(10, None, 1234, true).unwrap();
    assert!(LTCCell::<Backend>::new(&wiring, None, &device).is_err());
}

#[test]
fn test_ltc_rejects_mismatched_built_wiring() {
    let device = Default::default();
    let mut wiring = FullyConnected::new(10, None, 1234, true).unwrap();
    wiring.build(3).unwrap();
    assert!(LTCCell::<Backend>::new(&wiring, Some(4), &device).is_err());
    assert!(LTCCell::<Backend>::new(&wiring, None, &device).is_ok());
}

#[test]
fn test_ltc_forward_shapes() {
    let device = Default::default();
    let cell = create_test_cell();

    let input = Tensor::<Backend, 2>::random([4, 8], Distribution::Normal(0.0, 1.0), &device);
    let state = Tensor::<Backend, 2>::zeros([4, 10], &device);
    let (output, new_state) = cell.forward(input, state, Tensor::ones([4], &device));

    assert_eq!(output.dims(), [4, 5]);
    assert_eq!(new_state.dims(), [4, 10]);
}

#[test]
fn test_ltc_with_ncp_wiring() {
    let device = Default::default();
    let mut wiring = NCP::new(6, 4, 2, 3, 2, 2, 2, 22222).unwrap();
    wiring.build(3).unwrap();

    let cell = LTCCell::<Backend>::new(&wiring, None, &device).unwrap();
    assert_eq!(cell.state_size(), 12);
    assert_eq!(cell.motor_size(), 2);
    assert_eq!(cell.synapse_count(), wiring.synapse_count());

    let (output, state) = cell.forward(
        Tensor::ones([2, 3], &device),
        Tensor::zeros([2, 12], &device),
        Tensor::ones([2], &device),
    );
    assert_eq!(output.dims(), [2, 2]);
    let values: Vec<f32> = state.into_data().to_vec().unwrap();
    assert!(values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_mapping_modes_change_parameter_count() {
    let device = Default::default();
    let mut wiring = AutoNCP::new(10, 2, 0.5, 1).unwrap();
    wiring.build(4).unwrap();

    let affine = LTCCell::<Backend>::new(&wiring, None, &device).unwrap();
    let linear = LTCCell::<Backend>::new(&wiring, None, &device)
        .unwrap()
        .with_input_mapping(MappingMode::Linear, &device)
        .with_output_mapping(MappingMode::Linear, &device);
    let none = LTCCell::<Backend>::new(&wiring, None, &device)
        .unwrap()
        .with_input_mapping(MappingMode::None, &device)
        .with_output_mapping(MappingMode::None, &device);

    // Affine adds a bias over the 4 inputs and the 2 motor outputs
    assert_eq!(affine.num_params() - linear.num_params(), 4 + 2);
    assert_eq!(linear.num_params() - none.num_params(), 4 + 2);
}

#[test]
fn test_elapsed_time_matters() {
    let device = Default::default();
    let cell = create_test_cell();
    let input = Tensor::<Backend, 2>::ones([1, 8], &device);
    let state = Tensor::<Backend, 2>::zeros([1, 10], &device);

    let (_, short) = cell.forward(input.clone(), state.clone(), Tensor::full([1], 0.1, &device));
    let (_, long) = cell.forward(input, state, Tensor::full([1], 10.0, &device));
    let diff: f32 = short.sub(long).abs().max().into_scalar();
    assert!(diff > 1e-6);
}
