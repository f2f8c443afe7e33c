use serde::{Deserialize, Serialize};

/// Element-wise activation shared by every layer of a network.
///
/// Each variant carries a stable integer id so a compute device can pick the
/// same function without any string lookup. The ids are part of the
/// network-config record uploaded to the device and must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    /// Logistic sigmoid `1 / (1 + e^-x)`.
    Sigmoid,
    /// `x / (1 + |x|)`; a cheap sigmoid-shaped curve without `exp`.
    Softsign,
    Tanh,
    ReLU,
    Identity,
}

impl ActivationFunction {
    pub fn value(&self, x: f32) -> f32 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Softsign => x / (1.0 + x.abs()),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x` (not the output).
    pub fn derivative(&self, x: f32) -> f32 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.value(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::Softsign => {
                let div = 1.0 + x.abs();
                1.0 / (div * div)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
        }
    }

    pub fn device_id(&self) -> i32 {
        match self {
            ActivationFunction::Sigmoid => 0,
            ActivationFunction::Softsign => 1,
            ActivationFunction::Tanh => 2,
            ActivationFunction::ReLU => 3,
            ActivationFunction::Identity => 4,
        }
    }

    pub fn from_device_id(id: i32) -> Option<ActivationFunction> {
        match id {
            0 => Some(ActivationFunction::Sigmoid),
            1 => Some(ActivationFunction::Softsign),
            2 => Some(ActivationFunction::Tanh),
            3 => Some(ActivationFunction::ReLU),
            4 => Some(ActivationFunction::Identity),
            _ => None,
        }
    }
}

impl Default for ActivationFunction {
    fn default() -> Self {
        ActivationFunction::Sigmoid
    }
}
