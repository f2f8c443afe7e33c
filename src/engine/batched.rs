use std::mem::size_of;

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::cost::CostFunction;
use crate::device::kernels::{backward_args, forward_args};
use crate::device::{BufferHandle, ComputeDevice, DeviceError, MemoryAccess};
use crate::engine::layout::{self, NetworkConfig};
use crate::engine::session::DeviceSession;
use crate::error::Result;
use crate::gradient::GradientVector;
use crate::math::round_up;
use crate::network::Network;
use crate::train::TrainingExample;

struct MinibatchBuffers {
    config: BufferHandle,
    inputs: BufferHandle,
    activations_and_z: BufferHandle,
    parameters: BufferHandle,
    delta_k: BufferHandle,
    desired_outputs: BufferHandle,
    gradient: BufferHandle,
}

const F32: usize = size_of::<f32>();

/// Device counterpart of `scalar::compute_gradient`; same inputs, same result.
///
/// The minibatch and the network are flattened into a handful of buffers
/// (see `layout`). One forward dispatch per layer runs from the input side,
/// then one backward dispatch per layer from the output side. Each dispatch
/// covers every neuron of one layer for every sample. The device leaves one
/// gradient block per sample, summed on the host after a blocking read-back.
///
/// All device allocations are released before this returns. A failure at
/// any step aborts the minibatch and no gradient is produced.
pub fn compute_gradient(
    session: &mut DeviceSession,
    config: &EngineConfig,
    network: &Network,
    examples: &[TrainingExample],
    cost: CostFunction,
) -> Result<GradientVector> {
    network.validate_minibatch(examples)?;

    let shape = NetworkConfig::for_minibatch(network, examples.len(), cost);
    let words = shape.to_words()?;
    let kernels = session.kernels;
    let mut device = session.scope();
    debug!(
        device = device.name(),
        samples = shape.sample_count,
        layers = shape.layer_count(),
        "computing minibatch gradient on device"
    );

    let buffers = upload_minibatch(&mut *device, &shape, &words, network, examples)?;

    let bindings = [
        (forward_args::CONFIG, buffers.config),
        (forward_args::ACTIVATIONS_AND_Z, buffers.activations_and_z),
        (forward_args::INPUTS, buffers.inputs),
        (forward_args::PARAMETERS, buffers.parameters),
    ];
    for (index, buffer) in bindings {
        device.set_argument(kernels.forward_pass, index, buffer)?;
    }
    let bindings = [
        (backward_args::CONFIG, buffers.config),
        (backward_args::ACTIVATIONS_AND_Z, buffers.activations_and_z),
        (backward_args::DELTA_K, buffers.delta_k),
        (backward_args::GRADIENT, buffers.gradient),
        (backward_args::DESIRED_OUTPUTS, buffers.desired_outputs),
        (backward_args::INPUTS, buffers.inputs),
        (backward_args::PARAMETERS, buffers.parameters),
    ];
    for (index, buffer) in bindings {
        device.set_argument(kernels.backward_pass, index, buffer)?;
    }

    let local = config.tile_group;
    let global_for = |layer: usize| {
        [
            round_up(shape.neuron_counts[layer], local[0]),
            round_up(shape.sample_count, local[1]),
        ]
    };

    for layer in 0..shape.layer_count() {
        let global = global_for(layer);
        trace!(layer, ?global, "forward dispatch");
        device.dispatch(kernels.forward_pass, layer as u32, &global, &local)?;
    }
    for layer in (0..shape.layer_count()).rev() {
        let global = global_for(layer);
        trace!(layer, ?global, "backward dispatch");
        device.dispatch(kernels.backward_pass, layer as u32, &global, &local)?;
    }

    let mut blocks = vec![0.0_f32; shape.gradient_buffer_len()];
    device.read_buffer(buffers.gradient, 0, bytemuck::cast_slice_mut(&mut blocks))?;
    drop(device);

    Ok(layout::reduce_sample_gradients(network, &blocks, shape.sample_count))
}

fn upload_minibatch(
    device: &mut dyn ComputeDevice,
    shape: &NetworkConfig,
    words: &[i32],
    network: &Network,
    examples: &[TrainingExample],
) -> std::result::Result<MinibatchBuffers, DeviceError> {
    let config = device.allocate_buffer(
        words.len() * size_of::<i32>(),
        MemoryAccess::ReadOnly,
        Some(bytemuck::cast_slice(words)),
    )?;

    let inputs = device.allocate_buffer(shape.input_buffer_len() * F32, MemoryAccess::ReadOnly, None)?;
    let stride = shape.input_width * F32;
    for (s, example) in examples.iter().enumerate() {
        device.upload_partial(inputs, s * stride, bytemuck::cast_slice(&example.input), false)?;
    }

    let parameters = layout::flatten_parameters(network);
    let parameters = device.allocate_buffer(
        parameters.len() * F32,
        MemoryAccess::ReadOnly,
        Some(bytemuck::cast_slice(&parameters)),
    )?;

    let desired = layout::flatten_desired_outputs(examples);
    let desired_outputs = device.allocate_buffer(
        desired.len() * F32,
        MemoryAccess::ReadOnly,
        Some(bytemuck::cast_slice(&desired)),
    )?;

    Ok(MinibatchBuffers {
        config,
        inputs,
        activations_and_z: device.allocate_buffer(shape.activation_buffer_len() * F32, MemoryAccess::ReadWrite, None)?,
        parameters,
        delta_k: device.allocate_buffer(shape.delta_buffer_len() * F32, MemoryAccess::ReadWrite, None)?,
        desired_outputs,
        gradient: device.allocate_buffer(shape.gradient_buffer_len() * F32, MemoryAccess::WriteOnly, None)?,
    })
}
