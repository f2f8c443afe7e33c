use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::InvalidInput;
use crate::layers::dense::Layer;
use crate::train::TrainingExample;

/// Ordered stack of dense layers sharing one activation function.
///
/// Index 0 is the first hidden layer; the last layer is the output layer.
/// The engine only ever reads a network. Weights change between minibatch
/// calls, through the training loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub layers: Vec<Layer>,
    pub activation: ActivationFunction,
}

impl Network {
    /// Builds a randomly initialized network from an input width and the
    /// neuron count of each layer.
    pub fn new(
        input_size: usize,
        layer_sizes: &[usize],
        activation: ActivationFunction,
        rng: &mut impl Rng,
    ) -> Network {
        let mut layers = Vec::with_capacity(layer_sizes.len());
        let mut fan_in = input_size;
        for &size in layer_sizes {
            layers.push(Layer::new(size, fan_in, rng));
            fan_in = size;
        }
        Network { layers, activation }
    }

    /// Wraps explicit layers, checking that consecutive shapes line up.
    pub fn from_layers(layers: Vec<Layer>, activation: ActivationFunction) -> Result<Network, InvalidInput> {
        let network = Network { layers, activation };
        network.validate()?;
        Ok(network)
    }

    /// Number of inputs the first layer consumes.
    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, Layer::weights_per_neuron)
    }

    /// Number of neurons in the output layer.
    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, Layer::neuron_count)
    }

    pub fn widest_layer(&self) -> usize {
        self.layers.iter().map(Layer::neuron_count).max().unwrap_or(0)
    }

    pub fn total_neurons(&self) -> usize {
        self.layers.iter().map(Layer::neuron_count).sum()
    }

    pub fn total_parameters(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Checks every layer's storage and biases, then its columns against the
    /// previous layer's neuron count.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        if self.layers.is_empty() {
            return Err(InvalidInput::EmptyNetwork);
        }
        let mut expected = self.input_width();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.validate(i)?;
            if layer.weights_per_neuron() != expected {
                return Err(InvalidInput::LayerShape {
                    layer: i,
                    expected,
                    actual: layer.weights_per_neuron(),
                });
            }
            expected = layer.neuron_count();
        }
        Ok(())
    }

    /// Validates the network and a non-empty minibatch against it.
    pub fn validate_minibatch(&self, examples: &[TrainingExample]) -> Result<(), InvalidInput> {
        self.validate()?;
        if examples.is_empty() {
            return Err(InvalidInput::EmptyMinibatch);
        }
        let (inputs, outputs) = (self.input_width(), self.output_width());
        for (i, example) in examples.iter().enumerate() {
            if example.input.len() != inputs {
                return Err(InvalidInput::InputWidth { example: i, expected: inputs, actual: example.input.len() });
            }
            if example.desired_output.len() != outputs {
                return Err(InvalidInput::OutputWidth {
                    example: i,
                    expected: outputs,
                    actual: example.desired_output.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn layer(rows: usize, cols: usize) -> Layer {
        Layer::from_parts(vec![vec![0.1; cols]; rows], vec![0.0; rows]).unwrap()
    }

    #[test]
    fn new_chains_fan_in() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = Network::new(4, &[3, 2], ActivationFunction::Tanh, &mut rng);
        assert!(net.validate().is_ok());
        assert_eq!(net.input_width(), 4);
        assert_eq!(net.output_width(), 2);
        assert_eq!(net.widest_layer(), 3);
        assert_eq!(net.total_neurons(), 5);
        assert_eq!(net.total_parameters(), 3 * 4 + 3 + 2 * 3 + 2);
    }

    #[test]
    fn mismatched_columns_are_reported_with_layer_index() {
        let err = Network::from_layers(vec![layer(3, 2), layer(1, 2)], ActivationFunction::Sigmoid).unwrap_err();
        assert_eq!(err, InvalidInput::LayerShape { layer: 1, expected: 3, actual: 2 });
    }

    #[test]
    fn short_bias_vector_is_rejected() {
        let mut bad = layer(2, 2);
        bad.biases.pop();
        let err = Network::from_layers(vec![bad], ActivationFunction::Sigmoid).unwrap_err();
        assert_eq!(err, InvalidInput::BiasLength { layer: 0, neurons: 2, biases: 1 });
    }

    #[test]
    fn resized_weight_matrix_is_rejected_not_sliced() {
        let mut bad = layer(1, 2);
        bad.weights.rows = 2;
        bad.biases.push(0.0);
        let net = Network { layers: vec![bad], activation: ActivationFunction::Sigmoid };
        assert_eq!(net.validate().unwrap_err(), InvalidInput::WeightStorage { layer: 0, rows: 2, cols: 2, stored: 2 });
        let example = TrainingExample::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        assert!(net.validate_minibatch(&[example]).is_err());
    }

    #[test]
    fn empty_network_is_rejected() {
        let err = Network::from_layers(vec![], ActivationFunction::Sigmoid).unwrap_err();
        assert_eq!(err, InvalidInput::EmptyNetwork);
    }

    #[test]
    fn minibatch_widths_are_checked() {
        let net = Network::from_layers(vec![layer(2, 2), layer(1, 2)], ActivationFunction::Sigmoid).unwrap();
        let good = TrainingExample::new(vec![0.0, 1.0], vec![1.0]);
        let wide = TrainingExample::new(vec![0.0, 1.0, 2.0], vec![1.0]);
        assert!(net.validate_minibatch(&[good.clone()]).is_ok());
        assert_eq!(
            net.validate_minibatch(&[good.clone(), wide]).unwrap_err(),
            InvalidInput::InputWidth { example: 1, expected: 2, actual: 3 }
        );
        let bad_out = TrainingExample::new(vec![0.0, 1.0], vec![1.0, 0.0]);
        assert!(matches!(
            net.validate_minibatch(&[bad_out]).unwrap_err(),
            InvalidInput::OutputWidth { .. }
        ));
        assert_eq!(net.validate_minibatch(&[]).unwrap_err(), InvalidInput::EmptyMinibatch);
    }
}
