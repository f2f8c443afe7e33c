use rand::Rng;

use crate::error::InvalidInput;
use crate::gradient::NeuronGradient;
use crate::math::matrix::Matrix;

/// Fully connected layer: `weights` is (neurons × inputs), one bias per neuron.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Vec<f32>,
}

impl Layer {
    /// Xavier-initialized weights and zero biases.
    pub fn new(size: usize, input_size: usize, rng: &mut impl Rng) -> Layer {
        Layer {
            weights: Matrix::xavier(size, input_size, rng),
            biases: vec![0.0; size],
        }
    }

    /// Builds a layer from explicit weight rows (one row per neuron) and biases.
    pub fn from_parts(weights: Vec<Vec<f32>>, biases: Vec<f32>) -> Result<Layer, InvalidInput> {
        Ok(Layer { weights: Matrix::from_rows(weights)?, biases })
    }

    pub fn neuron_count(&self) -> usize {
        self.weights.rows
    }

    pub fn weights_per_neuron(&self) -> usize {
        self.weights.cols
    }

    /// Checks the weight storage against the declared `rows × cols` and the
    /// bias vector against the neuron count. `index` is only used for the report.
    pub fn validate(&self, index: usize) -> Result<(), InvalidInput> {
        let (rows, cols) = (self.weights.rows, self.weights.cols);
        if rows.checked_mul(cols) != Some(self.weights.len()) {
            return Err(InvalidInput::WeightStorage { layer: index, rows, cols, stored: self.weights.len() });
        }
        if self.biases.len() != rows {
            return Err(InvalidInput::BiasLength { layer: index, neurons: rows, biases: self.biases.len() });
        }
        Ok(())
    }

    /// Weights plus biases; the stride of this layer in a flattened parameter buffer.
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// `z = W·prev + b` for every neuron, products summed in column order
    /// with the bias added last. The device kernels use the same order.
    pub fn pre_activations(&self, prev: &[f32]) -> Vec<f32> {
        (0..self.neuron_count())
            .map(|m| {
                let acc = self.weights.row(m).iter().zip(prev)
                    .fold(0.0_f32, |acc, (w, x)| acc + w * x);
                acc + self.biases[m]
            })
            .collect()
    }

    /// Applies pre-computed gradients scaled by `step`.
    pub fn apply_gradients(&mut self, neuron_grads: &[NeuronGradient], step: f32) {
        for (m, grad) in neuron_grads.iter().enumerate() {
            for (w, g) in self.weights.row_mut(m).iter_mut().zip(&grad.weights) {
                *w -= step * g;
            }
            self.biases[m] -= step * grad.bias;
        }
    }
}
