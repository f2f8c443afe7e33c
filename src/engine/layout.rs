use crate::cost::CostFunction;
use crate::error::InvalidInput;
use crate::gradient::GradientVector;
use crate::network::Network;
use crate::train::TrainingExample;

pub const CURSOR: usize = 0;
pub const LAYER_COUNT: usize = 1;
pub const SAMPLE_COUNT: usize = 2;
pub const ACTIVATION_ID: usize = 3;
pub const COST_ID: usize = 4;
pub const TOTAL_ACTIVATIONS: usize = 5;
pub const TOTAL_PARAMETERS: usize = 6;
pub const WIDEST_LAYER: usize = 7;
pub const INPUT_WIDTH: usize = 8;
pub const NEURON_COUNTS: usize = 9;

/// A count as a device `i32` word.
pub fn device_word(what: &'static str, value: usize) -> Result<i32, InvalidInput> {
    i32::try_from(value).map_err(|_| InvalidInput::DeviceWordOverflow { what, value })
}

/// Decoded network-config record, the integer words every device buffer
/// offset is derived from. Word order:
///
/// | word | meaning                                   |
/// |------|-------------------------------------------|
/// | 0    | layer cursor at upload time (always 0)    |
/// | 1    | layer count                               |
/// | 2    | sample count                              |
/// | 3    | activation function id                    |
/// | 4    | cost function id                          |
/// | 5    | total activation count (sum of neurons)   |
/// | 6    | total weight + bias count                 |
/// | 7    | widest layer neuron count                 |
/// | 8    | input width                               |
/// | 9..  | neuron count of each layer                |
///
/// The layer a dispatch works on travels with the dispatch itself, so word 0
/// is never rewritten during a minibatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub sample_count: usize,
    pub activation_id: i32,
    pub cost_id: i32,
    pub total_activations: usize,
    pub total_parameters: usize,
    pub widest_layer: usize,
    pub input_width: usize,
    pub neuron_counts: Vec<usize>,
}

impl NetworkConfig {
    pub fn for_minibatch(network: &Network, sample_count: usize, cost: CostFunction) -> NetworkConfig {
        NetworkConfig {
            sample_count,
            activation_id: network.activation.device_id(),
            cost_id: cost.device_id(),
            total_activations: network.total_neurons(),
            total_parameters: network.total_parameters(),
            widest_layer: network.widest_layer(),
            input_width: network.input_width(),
            neuron_counts: network.layers.iter().map(|l| l.neuron_count()).collect(),
        }
    }

    /// Encodes the record. Fails if any count does not fit an `i32` word.
    pub fn to_words(&self) -> Result<Vec<i32>, InvalidInput> {
        let mut words = vec![
            0,
            device_word("layer count", self.layer_count())?,
            device_word("sample count", self.sample_count)?,
            self.activation_id,
            self.cost_id,
            device_word("total activation count", self.total_activations)?,
            device_word("total parameter count", self.total_parameters)?,
            device_word("widest layer", self.widest_layer)?,
            device_word("input width", self.input_width)?,
        ];
        for &n in &self.neuron_counts {
            words.push(device_word("layer neuron count", n)?);
        }
        Ok(words)
    }

    /// Parses a record; `None` if it is truncated or holds negative counts.
    pub fn from_words(words: &[i32]) -> Option<NetworkConfig> {
        let count = |i: usize| words.get(i).and_then(|&w| usize::try_from(w).ok());
        let layers = count(LAYER_COUNT)?;
        let neuron_counts = (0..layers)
            .map(|l| count(NEURON_COUNTS + l))
            .collect::<Option<Vec<_>>>()?;
        Some(NetworkConfig {
            sample_count: count(SAMPLE_COUNT)?,
            activation_id: *words.get(ACTIVATION_ID)?,
            cost_id: *words.get(COST_ID)?,
            total_activations: count(TOTAL_ACTIVATIONS)?,
            total_parameters: count(TOTAL_PARAMETERS)?,
            widest_layer: count(WIDEST_LAYER)?,
            input_width: count(INPUT_WIDTH)?,
            neuron_counts,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.neuron_counts.len()
    }

    /// Columns of `layer`'s weight matrix.
    pub fn inputs_of(&self, layer: usize) -> usize {
        if layer == 0 { self.input_width } else { self.neuron_counts[layer - 1] }
    }

    /// Index of `layer`'s first activation for `sample` in the activation/z buffer.
    ///
    /// Layer-major: all samples of layer 0, then all samples of layer 1, ...
    pub fn activation_offset(&self, layer: usize, sample: usize) -> usize {
        let before: usize = self.neuron_counts[..layer].iter().sum();
        before * self.sample_count + sample * self.neuron_counts[layer]
    }

    /// Start of the z half of the activation/z buffer.
    pub fn z_base(&self) -> usize {
        self.total_activations * self.sample_count
    }

    /// Index of `layer`'s first weight in the weights+biases buffer.
    pub fn parameter_offset(&self, layer: usize) -> usize {
        (0..layer)
            .map(|l| self.neuron_counts[l] * (self.inputs_of(l) + 1))
            .sum()
    }

    /// Index of `layer`'s first bias; the biases follow the weight matrix.
    pub fn bias_offset(&self, layer: usize) -> usize {
        self.parameter_offset(layer) + self.neuron_counts[layer] * self.inputs_of(layer)
    }

    /// Index of half `half` of `sample`'s delta-k slot.
    pub fn delta_offset(&self, sample: usize, half: usize) -> usize {
        (sample * 2 + half) * self.widest_layer
    }

    /// Half of the delta-k buffer the backward step for `layer` writes into.
    /// The step reads the other half, written by the step for `layer + 1`.
    pub fn write_half(&self, layer: usize) -> usize {
        (self.layer_count() - 1 - layer) % 2
    }

    pub fn output_width(&self) -> usize {
        self.neuron_counts.last().copied().unwrap_or(0)
    }

    pub fn input_buffer_len(&self) -> usize {
        self.input_width * self.sample_count
    }

    pub fn desired_buffer_len(&self) -> usize {
        self.output_width() * self.sample_count
    }

    pub fn activation_buffer_len(&self) -> usize {
        self.total_activations * self.sample_count * 2
    }

    pub fn delta_buffer_len(&self) -> usize {
        self.widest_layer * self.sample_count * 2
    }

    pub fn gradient_buffer_len(&self) -> usize {
        self.total_parameters * self.sample_count
    }
}

/// Per layer: the row-major weight matrix, then the bias vector.
pub fn flatten_parameters(network: &Network) -> Vec<f32> {
    let mut flat = Vec::with_capacity(network.total_parameters());
    for layer in &network.layers {
        flat.extend_from_slice(layer.weights.as_slice());
        flat.extend_from_slice(&layer.biases);
    }
    flat
}

/// Sample-major desired outputs.
pub fn flatten_desired_outputs(examples: &[TrainingExample]) -> Vec<f32> {
    examples.iter().flat_map(|e| e.desired_output.iter().copied()).collect()
}

/// Sums the per-sample gradient blocks read back from the device.
///
/// `blocks` holds `sample_count` blocks, each laid out like
/// `flatten_parameters`.
pub fn reduce_sample_gradients(network: &Network, blocks: &[f32], sample_count: usize) -> GradientVector {
    let stride = network.total_parameters();
    let mut gradient = GradientVector::zeros_for(network);
    let mut offset = 0;
    for (layer, layer_grad) in network.layers.iter().zip(gradient.layers.iter_mut()) {
        let cols = layer.weights_per_neuron();
        let bias_start = offset + layer.weights.len();
        for (i, neuron) in layer_grad.iter_mut().enumerate() {
            let row_start = offset + i * cols;
            for s in 0..sample_count {
                let block = &blocks[s * stride..(s + 1) * stride];
                for (g, v) in neuron.weights.iter_mut().zip(&block[row_start..row_start + cols]) {
                    *g += v;
                }
                neuron.bias += block[bias_start + i];
            }
        }
        offset += layer.parameter_count();
    }
    gradient
}
