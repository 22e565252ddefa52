use thiserror::Error;

/// Errors raised while building wirings, models, datasets or writing reports.
#[derive(Error, Debug)]
pub enum NcpsError {
    #[error("Wiring error: {message}")]
    InvalidWiring { message: String },

    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },

    #[error("Shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("Unknown activation: {name}. Valid options are {valid:?}")]
    UnknownActivation {
        name: String,
        valid: &'static [&'static str],
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl NcpsError {
    pub fn wiring(message: impl Into<String>) -> Self {
        Self::InvalidWiring {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NcpsError>;
