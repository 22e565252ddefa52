//! Cell Comparison Example
//!
//! Trains the CfC modes, a wired CfC and two LTC variants on the same sine
//! sequence and prints them ranked by final loss.

use std::path::Path;

use ncps_demos::config::ExperimentConfig;
use ncps_demos::experiments::{run_comparison, TrainBackend};
use ncps_demos::logging::init_cli_logger;

fn main() -> ncps_demos::Result<()> {
    init_cli_logger(false);

    let mut config = ExperimentConfig::default();
    config.data.sequence_length = 100;
    config.training.epochs = 30;

    let device = Default::default();
    let report = run_comparison::<TrainBackend>(&config, Path::new("output/cell_comparison"), &device)?;

    println!("\nTraining complete. Final losses:");
    print!("{}", report);
    if let Some(best) = report.best() {
        println!("\nBest: {}", best.name);
    }
    Ok(())
}
