use crate::activation::ActivationFunction;
use crate::cost::CostFunction;
use crate::error::Result;
use crate::gradient::{GradientVector, NeuronGradient};
use crate::network::Network;
use crate::train::TrainingExample;

/// Per-layer activations and pre-activations of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardTrace {
    pub activations: Vec<Vec<f32>>,
    pub z_values: Vec<Vec<f32>>,
}

impl ForwardTrace {
    pub fn output(&self) -> &[f32] {
        self.activations.last().map_or(&[][..], Vec::as_slice)
    }
}

/// Runs the network on `input`, keeping every layer's `a` and `z`.
///
/// The caller is responsible for shape validation.
pub fn forward_pass(network: &Network, input: &[f32]) -> ForwardTrace {
    let mut activations: Vec<Vec<f32>> = Vec::with_capacity(network.layers.len());
    let mut z_values = Vec::with_capacity(network.layers.len());
    for (i, layer) in network.layers.iter().enumerate() {
        let prev = if i == 0 { input } else { &activations[i - 1][..] };
        let z = layer.pre_activations(prev);
        let a = z.iter().map(|&x| network.activation.value(x)).collect();
        z_values.push(z);
        activations.push(a);
    }
    ForwardTrace { activations, z_values }
}

/// Sums the gradient of every example in `examples`, one example at a time
/// on the calling thread.
///
/// Fails with `InvalidInput` before doing any arithmetic if the network or
/// any example is malformed.
pub fn compute_gradient(
    network: &Network,
    examples: &[TrainingExample],
    cost: CostFunction,
) -> Result<GradientVector> {
    network.validate_minibatch(examples)?;

    let mut gradient = GradientVector::zeros_for(network);
    for example in examples {
        accumulate_example(network, cost, &mut gradient, example);
    }
    Ok(gradient)
}

fn accumulate_example(
    network: &Network,
    cost: CostFunction,
    gradient: &mut GradientVector,
    example: &TrainingExample,
) {
    let trace = forward_pass(network, &example.input);
    let last = network.layers.len() - 1;

    let mut delta_k = output_layer_delta(network.activation, cost, &trace, &example.desired_output);
    accumulate_layer(&mut gradient.layers[last], &delta_k, prev_activations(example, &trace, last));

    // Runs zero times for a single-layer network.
    for l in (0..last).rev() {
        let delta = hidden_layer_delta(network, l, &delta_k, &trace.z_values[l]);
        accumulate_layer(&mut gradient.layers[l], &delta, prev_activations(example, &trace, l));
        delta_k = delta;
    }
}

/// Input feeding `layer`: the example itself for layer 0.
fn prev_activations<'a>(example: &'a TrainingExample, trace: &'a ForwardTrace, layer: usize) -> &'a [f32] {
    if layer == 0 {
        &example.input
    } else {
        &trace.activations[layer - 1]
    }
}

fn output_layer_delta(
    activation: ActivationFunction,
    cost: CostFunction,
    trace: &ForwardTrace,
    desired: &[f32],
) -> Vec<f32> {
    let z = trace.z_values.last().map_or(&[][..], Vec::as_slice);
    let a = trace.output();
    z.iter().zip(a).zip(desired)
        .map(|((&z, &a), &y)| cost.delta(z, a, y, activation))
        .collect()
}

/// `delta[l][i] = (Σ_k delta_k[k] · W[l+1][k][i]) · σ'(z[l][i])`
fn hidden_layer_delta(network: &Network, l: usize, delta_k: &[f32], z: &[f32]) -> Vec<f32> {
    let next = &network.layers[l + 1].weights;
    z.iter().enumerate()
        .map(|(i, &zi)| {
            let back = delta_k.iter().enumerate()
                .fold(0.0_f32, |acc, (k, d)| acc + d * next.get(k, i));
            back * network.activation.derivative(zi)
        })
        .collect()
}

fn accumulate_layer(layer_gradient: &mut [NeuronGradient], delta: &[f32], prev: &[f32]) {
    for (neuron, &d) in layer_gradient.iter_mut().zip(delta) {
        neuron.accumulate(d, prev);
    }
}
