//! # ncps-demos
//!
//! Neural Circuit Policy experiments on synthetic sequences, built on Burn.
//!
//! - [`wirings`]: FullyConnected, Random, NCP and AutoNCP connectivity
//! - [`cells`] and [`rnn`]: CfC (default, pure, no_gate; dense or wired) and
//!   LTC cells and their sequence layers
//! - [`data`]: the sine and sequence-sum tasks
//! - [`models`], [`training`], [`compare`]: models, the training loop and
//!   multi-model comparison
//! - [`profiling`], [`report`]: phase timings, memory, CSV/JSON/DOT output
//!
//! ```
//! use ncps_demos::prelude::*;
//!
//! let mut wiring = AutoNCP::new(32, 8, 0.5, 22222).unwrap();
//! wiring.build(16).unwrap();
//!
//! assert_eq!(wiring.units(), 32);
//! assert_eq!(wiring.output_dim(), Some(8));
//! ```

pub mod activation;
pub mod cells;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod experiments;
pub mod logging;
pub mod models;
pub mod profiling;
pub mod report;
pub mod rnn;
pub mod training;
pub mod wirings;

pub use error::{NcpsError, Result};

pub mod prelude {
    pub use crate::activation::{Activation, LeCun};
    pub use crate::cells::{CfCCell, CfcMode, CfcOptions, LTCCell, MappingMode, WiredCfCCell};
    pub use crate::config::{ExperimentConfig, TrainingConfig};
    pub use crate::data::{SequenceBatch, SequenceSumTask, SineTask};
    pub use crate::models::{
        LiquidSequenceModel, ModelSpec, RecurrentModel, SequenceModel, SineRegressor,
    };
    pub use crate::rnn::{CfC, LTC};
    pub use crate::training::{StopReason, Trainer, TrainingHistory};
    pub use crate::wirings::{AutoNCP, FullyConnected, NeuronType, Random, Wiring, NCP};
}
