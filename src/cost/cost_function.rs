use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;

/// Small epsilon added inside ln() to prevent ln(0) = -inf.
const EPS: f32 = 1e-7;

/// Error strategy used to seed backpropagation at the output layer.
///
/// - `MeanSquared`  — `C = ½·Σ(a − y)²`, delta `(a − y)·σ'(z)`.
/// - `CrossEntropy` — binary cross-entropy; pair with a `Sigmoid` output so
///   that `σ'(z)` cancels and the delta reduces to `a − y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostFunction {
    MeanSquared,
    CrossEntropy,
}

impl CostFunction {
    /// Scalar cost of one example.
    pub fn cost(&self, actual: &[f32], desired: &[f32]) -> f32 {
        match self {
            CostFunction::MeanSquared => {
                0.5 * actual.iter().zip(desired)
                    .map(|(a, y)| (a - y) * (a - y))
                    .sum::<f32>()
            }
            CostFunction::CrossEntropy => {
                actual.iter().zip(desired)
                    .map(|(a, y)| -(y * (a + EPS).ln() + (1.0 - y) * (1.0 - a + EPS).ln()))
                    .sum()
            }
        }
    }

    /// Output-layer error signal for one neuron.
    ///
    /// `z` is the neuron's pre-activation, `actual` its activation.
    pub fn delta(&self, z: f32, actual: f32, desired: f32, activation: ActivationFunction) -> f32 {
        match self {
            CostFunction::MeanSquared => (actual - desired) * activation.derivative(z),
            CostFunction::CrossEntropy => actual - desired,
        }
    }

    pub fn device_id(&self) -> i32 {
        match self {
            CostFunction::MeanSquared => 0,
            CostFunction::CrossEntropy => 1,
        }
    }

    pub fn from_device_id(id: i32) -> Option<CostFunction> {
        match id {
            0 => Some(CostFunction::MeanSquared),
            1 => Some(CostFunction::CrossEntropy),
            _ => None,
        }
    }
}

impl Default for CostFunction {
    fn default() -> Self {
        CostFunction::MeanSquared
    }
}
