//! Sine Wave Example
//!
//! Trains a CfC on the sine task with a short schedule and writes the loss
//! history and predictions under `output/sine_wave/`.

use std::path::Path;

use ncps_demos::config::ExperimentConfig;
use ncps_demos::experiments::{run_sine, TrainBackend};
use ncps_demos::logging::init_cli_logger;

fn main() -> ncps_demos::Result<()> {
    init_cli_logger(false);

    let mut config = ExperimentConfig::default();
    config.data.sequence_length = 200;
    config.training.epochs = 50;
    config.training.learning_rate = 0.01;
    config.training.eval_every = 25;

    let device = Default::default();
    let summary = run_sine::<TrainBackend>(&config, Path::new("output/sine_wave"), &device)?;

    println!("Parameters:   {}", summary.num_params);
    println!("Initial loss: {:.6}", summary.initial_loss);
    println!("Final loss:   {:.6}", summary.train_loss);
    println!("Stopped:      {:?}", summary.history.stop_reason);
    Ok(())
}
