use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ncps_demos::config::ExperimentConfig;
use ncps_demos::experiments::{self, TrainBackend, WiringExport};
use ncps_demos::logging;
use ncps_demos::models::WiringKind;

#[derive(Parser)]
#[command(name = "ncps-demos")]
#[command(about = "Neural Circuit Policy experiments on synthetic sequences")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Path to a TOML experiment configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory receiving the CSV and JSON outputs
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Override the number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override the training and data seeds
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum WiringArg {
    FullyConnected,
    AutoNcp,
    Random,
}

impl From<WiringArg> for WiringKind {
    fn from(arg: WiringArg) -> Self {
        match arg {
            WiringArg::FullyConnected => WiringKind::FullyConnected,
            WiringArg::AutoNcp => WiringKind::AutoNcp,
            WiringArg::Random => WiringKind::Random,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fit a CfC to a sine wave
    Sine(RunArgs),
    /// Train several cell configurations on the sine task and rank them
    Compare(RunArgs),
    /// Predict the sum over time of random sequences with a backbone CfC
    SequenceSum(RunArgs),
    /// Build a wiring and export it as Graphviz DOT and JSON
    Wiring {
        #[arg(long, value_enum, default_value = "auto-ncp")]
        kind: WiringArg,
        #[arg(long, default_value_t = 16)]
        units: usize,
        /// Motor neurons
        #[arg(long)]
        outputs: Option<usize>,
        #[arg(long, default_value_t = 2)]
        inputs: usize,
        #[arg(long, default_value_t = 0.5)]
        sparsity: f64,
        #[arg(long, default_value_t = 22222)]
        seed: u64,
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
}

fn load_config(args: &RunArgs) -> anyhow::Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => ExperimentConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        tracing::info!("Epochs overridden to {}", epochs);
        config.training.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        tracing::info!("Seed overridden to {}", seed);
        config.training.seed = seed;
        config.data.seed = seed;
    }
    config.validate().context("Invalid experiment configuration")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_cli_logger(cli.verbose);

    let device = Default::default();

    match cli.command {
        Command::Sine(args) => {
            let config = load_config(&args)?;
            let summary = experiments::run_sine::<TrainBackend>(&config, &args.output_dir, &device)
                .context("Sine experiment failed")?;
            println!(
                "sine: {} parameters, loss {:.6} -> {:.6} ({:?})",
                summary.num_params,
                summary.initial_loss,
                summary.train_loss,
                summary.history.stop_reason
            );
        }
        Command::Compare(args) => {
            let config = load_config(&args)?;
            let report =
                experiments::run_comparison::<TrainBackend>(&config, &args.output_dir, &device)
                    .context("Comparison failed")?;
            print!("{}", report);
        }
        Command::SequenceSum(args) => {
            let config = load_config(&args)?;
            let summary =
                experiments::run_sequence_sum::<TrainBackend>(&config, &args.output_dir, &device)
                    .context("Sequence-sum experiment failed")?;
            println!(
                "sequence-sum: {} parameters, train MSE {:.4}, test MSE {:.4}",
                summary.num_params,
                summary.train_loss,
                summary.test_loss.unwrap_or(f32::NAN)
            );
        }
        Command::Wiring {
            kind,
            units,
            outputs,
            inputs,
            sparsity,
            seed,
            output_dir,
        } => {
            let export = WiringExport {
                kind: kind.into(),
                units,
                motor_neurons: outputs,
                input_dim: inputs,
                sparsity_level: sparsity,
                seed,
            };
            let wiring = experiments::export_wiring(&export, &output_dir)
                .context("Wiring export failed")?;
            println!(
                "wiring: {} units, {} synapses, {} sensory synapses -> {}",
                wiring.units(),
                wiring.synapse_count(),
                wiring.sensory_synapse_count(),
                output_dir.join("wiring.dot").display()
            );
        }
    }

    Ok(())
}
