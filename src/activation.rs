//! Activation functions used by the CfC backbone
//!
//! Burn ships relu, tanh, gelu and silu; LeCun's scaled tanh is added here.

use std::fmt;
use std::str::FromStr;

use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::NcpsError;

/// LeCun's tanh activation function.
///
/// `f(x) = 1.7159 * tanh(0.666 * x)`
///
/// The scaling keeps the function close to the identity near the origin while
/// saturating at roughly ±1.7159.
///
/// # Example
///
/// ```rust
/// use burn::backend::NdArray;
/// use burn::tensor::Tensor;
/// use ncps_demos::activation::LeCun;
///
/// type Backend = NdArray<f32>;
/// let device = Default::default();
///
/// let x = Tensor::<Backend, 1>::from_floats([0.0, 1.0, -1.0], &device);
/// let y = LeCun::forward(x);
/// ```
pub struct LeCun;

impl LeCun {
    pub fn forward<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
        (x * 0.666f32).tanh() * 1.7159f32
    }
}

/// Backbone activation selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Gelu,
    Silu,
    #[default]
    LecunTanh,
}

impl Activation {
    pub const NAMES: &'static [&'static str] = &["relu", "tanh", "gelu", "silu", "lecun_tanh"];

    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => activation::relu(x),
            Activation::Tanh => x.tanh(),
            Activation::Gelu => activation::gelu(x),
            Activation::Silu => activation::silu(x),
            Activation::LecunTanh => LeCun::forward(x),
        }
    }

    /// Compact code stored inside modules
    pub(crate) fn code(self) -> u8 {
        match self {
            Activation::Relu => 0,
            Activation::Tanh => 1,
            Activation::Gelu => 2,
            Activation::Silu => 3,
            Activation::LecunTanh => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Self {
        match code {
            0 => Activation::Relu,
            1 => Activation::Tanh,
            2 => Activation::Gelu,
            3 => Activation::Silu,
            _ => Activation::LecunTanh,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Gelu => "gelu",
            Activation::Silu => "silu",
            Activation::LecunTanh => "lecun_tanh",
        }
    }
}

impl FromStr for Activation {
    type Err = NcpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "gelu" => Ok(Activation::Gelu),
            "silu" => Ok(Activation::Silu),
            "lecun_tanh" => Ok(Activation::LecunTanh),
            other => Err(NcpsError::UnknownActivation {
                name: other.to_string(),
                valid: Self::NAMES,
            }),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
