//! Wired CfC Cell Integration Tests

use burn::backend::NdArray;
use burn::tensor::Tensor;
use ncps_demos::cells::{CfcMode, WiredCfCCell};
use ncps_demos::wirings::{AutoNCP, FullyConnected, Wiring, NCP};

type Backend = NdArray<f32>;

fn create_wired_cell() -> WiredCfCCell<Backend> {
    let device = Default::default();
    let mut wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
    wiring.build(16).unwrap();

    WiredCfCCell::new(&wiring, CfcMode::Default, &device).unwrap()
}

fn ones_ts(batch: usize) -> Tensor<Backend, 1> {
    Tensor::ones([batch], &Default::default())
}

#[test]
fn test_wired_cfc_creation() {
    let cell = create_wired_cell();

    assert_eq!(cell.state_size(), 32);
    assert_eq!(cell.motor_size(), 8);
    assert_eq!(cell.sensory_size(), 16);
    assert_eq!(cell.num_layers(), 3);
}

#[test]
fn test_wired_cfc_layer_sizes() {
    let cell = create_wired_cell();
    let sizes = cell.layer_sizes();

    // inter, command, motor
    assert_eq!(sizes, &[14, 10, 8]);
    let total: usize = sizes.iter().sum();
    assert_eq!(total, cell.state_size());
}

#[test]
fn test_wired_cfc_requires_built_wiring() {
    let device = Default::default();
    let wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
    assert!(WiredCfCCell::<Backend>::new(&wiring, CfcMode::Default, &device).is_err());
}

#[test]
fn test_wired_cfc_forward() {
    let device = Default::default();
    let cell = create_wired_cell();

    let batch_size = 4;
    let input = Tensor::<Backend, 2>::zeros([batch_size, 16], &device);
    let hx = Tensor::<Backend, 2>::zeros([batch_size, 32], &device);

    let (output, new_hidden) = cell.forward(input, hx, ones_ts(batch_size));

    assert_eq!(output.dims(), [batch_size, 8]);
    assert_eq!(new_hidden.dims(), [batch_size, 32]);
}

#[test]
fn test_motor_output_is_last_layer_state() {
    let device = Default::default();
    let cell = create_wired_cell();

    let input = Tensor::<Backend, 2>::ones([2, 16], &device);
    let hx = Tensor::<Backend, 2>::zeros([2, 32], &device);
    let (output, new_hidden) = cell.forward(input, hx, ones_ts(2));

    let motor_state = new_hidden.narrow(1, 24, 8);
    let diff: f32 = output.sub(motor_state).abs().max().into_scalar();
    assert!(diff < 1e-6);
}

#[test]
fn test_wired_cfc_with_different_wirings() {
    let device = Default::default();

    let mut wiring = NCP::new(10, 8, 5, 6, 6, 4, 6, 22222).unwrap();
    wiring.build(10).unwrap();
    let cell = WiredCfCCell::<Backend>::new(&wiring, CfcMode::Pure, &device).unwrap();
    assert_eq!(cell.state_size(), 23);
    assert_eq!(cell.num_layers(), 3);

    // A fully connected wiring is a single layer
    let mut fc = FullyConnected::new(6, Some(2), 1, true).unwrap();
    fc.build(3).unwrap();
    let cell = WiredCfCCell::<Backend>::new(&fc, CfcMode::NoGate, &device).unwrap();
    assert_eq!(cell.num_layers(), 1);
    let (output, state) = cell.forward(
        Tensor::zeros([1, 3], &device),
        Tensor::zeros([1, 6], &device),
        ones_ts(1),
    );
    assert_eq!(output.dims(), [1, 2]);
    assert_eq!(state.dims(), [1, 6]);
}

#[test]
fn test_wired_cfc_information_flow() {
    let device = Default::default();
    let cell = create_wired_cell();

    let input1 = Tensor::<Backend, 2>::zeros([1, 16], &device);
    let input2 = Tensor::<Backend, 2>::ones([1, 16], &device);
    let hx = Tensor::<Backend, 2>::zeros([1, 32], &device);

    let (out1, _) = cell.forward(input1, hx.clone(), ones_ts(1));
    let (out2, _) = cell.forward(input2, hx, ones_ts(1));

    let diff: f32 = (out1 - out2).abs().sum().into_scalar();
    assert!(diff > 0.0, "Different inputs should produce different outputs");
}
