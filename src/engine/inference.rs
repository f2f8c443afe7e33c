use std::mem::size_of;

use tracing::trace;

use crate::activation::ActivationFunction;
use crate::config::EngineConfig;
use crate::device::kernels::single_layer_args;
use crate::device::MemoryAccess;
use crate::engine::layout::device_word;
use crate::engine::session::DeviceSession;
use crate::error::{InvalidInput, Result};
use crate::layers::Layer;
use crate::math::round_up;

/// Checks the layer itself, then `prev` against its weight matrix.
/// `index` is the layer's position, used in shape reports.
pub fn check_layer_input(layer: &Layer, index: usize, prev: &[f32]) -> std::result::Result<(), InvalidInput> {
    layer.validate(index)?;
    if layer.weights_per_neuron() != prev.len() {
        return Err(InvalidInput::ActivationLength { expected: layer.weights_per_neuron(), actual: prev.len() });
    }
    Ok(())
}

/// `σ(W·prev + b)` on the calling thread.
pub fn calculate_layer_scalar(
    layer: &Layer,
    index: usize,
    prev: &[f32],
    activation: ActivationFunction,
) -> Result<Vec<f32>> {
    check_layer_input(layer, index, prev)?;
    Ok(layer.pre_activations(prev).into_iter().map(|z| activation.value(z)).collect())
}

/// `σ(W·prev + b)` as one single-layer dispatch.
pub fn calculate_layer_on_device(
    session: &mut DeviceSession,
    config: &EngineConfig,
    layer: &Layer,
    index: usize,
    prev: &[f32],
    activation: ActivationFunction,
) -> Result<Vec<f32>> {
    check_layer_input(layer, index, prev)?;

    let kernel = session.kernels.single_layer;
    let rows = layer.neuron_count();
    let params = [
        device_word("layer rows", rows)?,
        device_word("layer columns", layer.weights_per_neuron())?,
        activation.device_id(),
    ];
    let mut device = session.scope();

    let inputs: [(u32, &[u8]); 4] = [
        (single_layer_args::WEIGHTS, bytemuck::cast_slice(layer.weights.as_slice())),
        (single_layer_args::BIASES, bytemuck::cast_slice(&layer.biases)),
        (single_layer_args::PREV_ACTIVATIONS, bytemuck::cast_slice(prev)),
        (single_layer_args::CONFIG, bytemuck::cast_slice(&params)),
    ];
    for (slot, bytes) in inputs {
        let buffer = device.allocate_buffer(bytes.len(), MemoryAccess::ReadOnly, Some(bytes))?;
        device.set_argument(kernel, slot, buffer)?;
    }
    let output = device.allocate_buffer(rows * size_of::<f32>(), MemoryAccess::WriteOnly, None)?;
    device.set_argument(kernel, single_layer_args::OUTPUT, output)?;

    let local = [config.layer_group_size];
    let global = [round_up(rows, config.layer_group_size)];
    trace!(rows, ?global, "single-layer dispatch");
    device.dispatch(kernel, 0, &global, &local)?;

    let mut result = vec![0.0_f32; rows];
    device.read_buffer(output, 0, bytemuck::cast_slice_mut(&mut result))?;
    Ok(result)
}
