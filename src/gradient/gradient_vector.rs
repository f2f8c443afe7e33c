use crate::network::Network;

/// Accumulated gradient of one neuron: one entry per incoming weight plus the bias.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeuronGradient {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl NeuronGradient {
    pub fn zeros(weight_count: usize) -> NeuronGradient {
        NeuronGradient { weights: vec![0.0; weight_count], bias: 0.0 }
    }

    /// `weights[j] += delta * prev[j]`, `bias += delta`.
    pub fn accumulate(&mut self, delta: f32, prev: &[f32]) {
        for (g, x) in self.weights.iter_mut().zip(prev) {
            *g += delta * x;
        }
        self.bias += delta;
    }
}

/// Per-layer, per-neuron gradient accumulators shaped like a `Network`.
///
/// Summed over every example in a minibatch; normalizing by the batch size
/// is left to the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GradientVector {
    pub layers: Vec<Vec<NeuronGradient>>,
}

impl GradientVector {
    /// Zeroed accumulators mirroring `network`'s shape.
    pub fn zeros_for(network: &Network) -> GradientVector {
        let layers = network.layers.iter()
            .map(|layer| {
                (0..layer.neuron_count())
                    .map(|_| NeuronGradient::zeros(layer.weights_per_neuron()))
                    .collect()
            })
            .collect();
        GradientVector { layers }
    }

    /// Element-wise sum with another gradient of the same shape.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn add_assign(&mut self, other: &GradientVector) {
        assert_eq!(self.layers.len(), other.layers.len(), "gradient layer counts differ");
        for (mine, theirs) in self.layers.iter_mut().zip(&other.layers) {
            assert_eq!(mine.len(), theirs.len(), "gradient neuron counts differ");
            for (a, b) in mine.iter_mut().zip(theirs) {
                assert_eq!(a.weights.len(), b.weights.len(), "gradient weight counts differ");
                for (x, y) in a.weights.iter_mut().zip(&b.weights) {
                    *x += y;
                }
                a.bias += b.bias;
            }
        }
    }

    /// All values in flattened-buffer order: per layer, every neuron's
    /// weights row by row, then that layer's biases.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::new();
        for layer in &self.layers {
            for neuron in layer {
                flat.extend_from_slice(&neuron.weights);
            }
            flat.extend(layer.iter().map(|n| n.bias));
        }
        flat
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter()
            .map(|layer| layer.iter().map(|n| n.weights.len() + 1).sum::<usize>())
            .sum()
    }

    /// Largest absolute entry; handy for convergence logging.
    pub fn max_abs(&self) -> f32 {
        self.to_flat().iter().fold(0.0_f32, |m, v| m.max(v.abs()))
    }
}
