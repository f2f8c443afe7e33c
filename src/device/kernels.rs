use rayon::prelude::*;

use crate::activation::ActivationFunction;
use crate::cost::CostFunction;
use crate::device::DeviceError;
use crate::engine::layout::NetworkConfig;

/// Argument slots of `Kernel::SingleLayer`.
pub mod single_layer_args {
    pub const WEIGHTS: u32 = 0;
    pub const BIASES: u32 = 1;
    pub const PREV_ACTIVATIONS: u32 = 2;
    pub const CONFIG: u32 = 3;
    pub const OUTPUT: u32 = 4;
}

/// Argument slots of `Kernel::ForwardPass`.
pub mod forward_args {
    pub const CONFIG: u32 = 0;
    pub const ACTIVATIONS_AND_Z: u32 = 1;
    pub const INPUTS: u32 = 2;
    pub const PARAMETERS: u32 = 3;
}

/// Argument slots of `Kernel::BackwardPass`.
pub mod backward_args {
    pub const CONFIG: u32 = 0;
    pub const ACTIVATIONS_AND_Z: u32 = 1;
    pub const DELTA_K: u32 = 2;
    pub const GRADIENT: u32 = 3;
    pub const DESIRED_OUTPUTS: u32 = 4;
    pub const INPUTS: u32 = 5;
    pub const PARAMETERS: u32 = 6;
}

// Kernels are written lane by lane, the way a device program would be: a
// lane is one (neuron, sample) pair and lanes past the real problem size do
// nothing. Lanes run on the rayon pool and only produce values; each kernel
// scatters them into its output buffers once every lane has finished.
fn lanes(global: &[usize]) -> impl IndexedParallelIterator<Item = (usize, usize)> {
    let width = global.first().copied().unwrap_or(0);
    let height = global.get(1).copied().unwrap_or(1);
    (0..width * height).into_par_iter().map(move |id| (id % width, id / width))
}

fn require(len: usize, needed: usize) -> Result<(), DeviceError> {
    if len < needed {
        return Err(DeviceError::OutOfBounds { offset: 0, len: needed * 4, size: len * 4 });
    }
    Ok(())
}

fn activation_for(id: i32) -> Result<ActivationFunction, DeviceError> {
    ActivationFunction::from_device_id(id).ok_or(DeviceError::UnknownFunctionId { kind: "activation", id })
}

fn cost_for(id: i32) -> Result<CostFunction, DeviceError> {
    CostFunction::from_device_id(id).ok_or(DeviceError::UnknownFunctionId { kind: "cost", id })
}

fn parse_config(words: &[i32], layer: usize) -> Result<NetworkConfig, DeviceError> {
    let cfg = NetworkConfig::from_words(words)
        .ok_or(DeviceError::OutOfBounds { offset: 0, len: words.len() * 4, size: words.len() * 4 })?;
    if layer >= cfg.layer_count() {
        return Err(DeviceError::InvalidLayer { layer, layers: cfg.layer_count() });
    }
    Ok(cfg)
}

fn dot(row: &[f32], prev: &[f32]) -> f32 {
    row.iter().zip(prev).fold(0.0_f32, |acc, (w, x)| acc + w * x)
}

/// `output[m] = σ(W[m]·prev + b[m])`; config is `[rows, cols, activation id]`.
pub fn single_layer(
    config: &[i32],
    weights: &[f32],
    biases: &[f32],
    prev: &[f32],
    output: &mut [f32],
    global: &[usize],
) -> Result<(), DeviceError> {
    let (rows, cols, act_id) = match config {
        [rows, cols, act_id, ..] if *rows >= 0 && *cols >= 0 => (*rows as usize, *cols as usize, *act_id),
        _ => return Err(DeviceError::OutOfBounds { offset: 0, len: 12, size: config.len() * 4 }),
    };
    let activation = activation_for(act_id)?;
    require(weights.len(), rows * cols)?;
    require(biases.len(), rows)?;
    require(prev.len(), cols)?;
    require(output.len(), rows)?;

    let results: Vec<(usize, f32)> = lanes(global)
        .filter_map(|(m, _)| {
            if m >= rows {
                return None;
            }
            let z = dot(&weights[m * cols..(m + 1) * cols], prev) + biases[m];
            Some((m, activation.value(z)))
        })
        .collect();
    for (m, a) in results {
        output[m] = a;
    }
    Ok(())
}

/// Computes `a` and `z` of `layer` for every sample.
pub fn forward_pass(
    config: &[i32],
    layer: usize,
    activations_and_z: &mut [f32],
    inputs: &[f32],
    parameters: &[f32],
    global: &[usize],
) -> Result<(), DeviceError> {
    let cfg = parse_config(config, layer)?;
    let activation = activation_for(cfg.activation_id)?;
    require(activations_and_z.len(), cfg.activation_buffer_len())?;
    require(inputs.len(), cfg.input_buffer_len())?;
    require(parameters.len(), cfg.total_parameters)?;

    let neurons = cfg.neuron_counts[layer];
    let cols = cfg.inputs_of(layer);
    let weight_offset = cfg.parameter_offset(layer);
    let bias_offset = cfg.bias_offset(layer);
    let z_base = cfg.z_base();

    let read: &[f32] = activations_and_z;
    let results: Vec<(usize, f32, f32)> = lanes(global)
        .filter_map(|(i, s)| {
            if i >= neurons || s >= cfg.sample_count {
                return None;
            }
            let prev = if layer == 0 {
                &inputs[s * cols..(s + 1) * cols]
            } else {
                let start = cfg.activation_offset(layer - 1, s);
                &read[start..start + cols]
            };
            let row = &parameters[weight_offset + i * cols..weight_offset + (i + 1) * cols];
            let z = dot(row, prev) + parameters[bias_offset + i];
            Some((cfg.activation_offset(layer, s) + i, z, activation.value(z)))
        })
        .collect();

    for (index, z, a) in results {
        activations_and_z[index] = a;
        activations_and_z[z_base + index] = z;
    }
    Ok(())
}

struct BackwardLane {
    delta_index: usize,
    delta: f32,
    row_start: usize,
    row: Vec<f32>,
    bias_index: usize,
}

/// Buffers read by the backward kernel.
pub struct BackwardInputs<'a> {
    pub activations_and_z: &'a [f32],
    pub desired_outputs: &'a [f32],
    pub inputs: &'a [f32],
    pub parameters: &'a [f32],
}

/// Computes the deltas of `layer` for every sample and writes that layer's
/// slice of each sample's gradient block.
///
/// The output layer seeds its delta from the cost function; every other
/// layer reads the deltas the step for `layer + 1` left in the other half of
/// its delta-k slot.
pub fn backward_pass(
    config: &[i32],
    layer: usize,
    source: BackwardInputs<'_>,
    delta_k: &mut [f32],
    gradient: &mut [f32],
    global: &[usize],
) -> Result<(), DeviceError> {
    let cfg = parse_config(config, layer)?;
    let activation = activation_for(cfg.activation_id)?;
    let cost = cost_for(cfg.cost_id)?;
    require(source.activations_and_z.len(), cfg.activation_buffer_len())?;
    require(source.desired_outputs.len(), cfg.desired_buffer_len())?;
    require(source.inputs.len(), cfg.input_buffer_len())?;
    require(source.parameters.len(), cfg.total_parameters)?;
    require(delta_k.len(), cfg.delta_buffer_len())?;
    require(gradient.len(), cfg.gradient_buffer_len())?;

    let last = cfg.layer_count() - 1;
    let neurons = cfg.neuron_counts[layer];
    let cols = cfg.inputs_of(layer);
    let write_half = cfg.write_half(layer);
    let read_half = 1 - write_half;
    let stride = cfg.total_parameters;
    let weight_offset = cfg.parameter_offset(layer);
    let bias_offset = cfg.bias_offset(layer);
    let z_base = cfg.z_base();
    let acts = source.activations_and_z;

    let read: &[f32] = delta_k;
    let results: Vec<BackwardLane> = lanes(global)
        .filter_map(|(i, s)| {
            if i >= neurons || s >= cfg.sample_count {
                return None;
            }
            let index = cfg.activation_offset(layer, s) + i;
            let z = acts[z_base + index];
            let delta = if layer == last {
                let desired = source.desired_outputs[s * neurons + i];
                cost.delta(z, acts[index], desired, activation)
            } else {
                let next_neurons = cfg.neuron_counts[layer + 1];
                let next_weights = cfg.parameter_offset(layer + 1);
                let prev_deltas = &read[cfg.delta_offset(s, read_half)..][..next_neurons];
                let back = prev_deltas.iter().enumerate().fold(0.0_f32, |acc, (k, d)| {
                    acc + d * source.parameters[next_weights + k * neurons + i]
                });
                back * activation.derivative(z)
            };

            let prev = if layer == 0 {
                &source.inputs[s * cols..(s + 1) * cols]
            } else {
                let start = cfg.activation_offset(layer - 1, s);
                &acts[start..start + cols]
            };
            Some(BackwardLane {
                delta_index: cfg.delta_offset(s, write_half) + i,
                delta,
                row_start: s * stride + weight_offset + i * cols,
                row: prev.iter().map(|x| delta * x).collect(),
                bias_index: s * stride + bias_offset + i,
            })
        })
        .collect();

    for lane in results {
        delta_k[lane.delta_index] = lane.delta;
        gradient[lane.row_start..lane.row_start + lane.row.len()].copy_from_slice(&lane.row);
        gradient[lane.bias_index] = lane.delta;
    }
    Ok(())
}
