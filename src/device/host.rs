use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use tracing::trace;

use crate::device::device::{BufferHandle, ComputeDevice, DeviceError, Kernel, KernelHandle, MemoryAccess};
use crate::device::kernels::{self, backward_args, forward_args, single_layer_args, BackwardInputs};

/// Counters a `HostDevice` keeps up to date; cheap to share with observers.
#[derive(Debug, Default)]
pub struct DeviceStats {
    live_allocations: AtomicUsize,
    pooled_allocations: AtomicUsize,
    dispatches: AtomicUsize,
}

impl DeviceStats {
    /// Allocations not yet released.
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Relaxed)
    }

    /// Released allocations kept for reuse.
    pub fn pooled_allocations(&self) -> usize {
        self.pooled_allocations.load(Ordering::Relaxed)
    }

    /// Kernel dispatches executed since the device was created.
    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::Relaxed)
    }
}

struct HostBuffer {
    // u32 words keep every f32/i32 view aligned.
    words: Vec<u32>,
    size_bytes: usize,
    access: MemoryAccess,
}

/// Compute device that runs the kernels on the host CPU.
///
/// Behaves like a single in-order device queue: every call completes before
/// it returns, so blocking and non-blocking uploads are the same thing here.
/// Released allocations go to a free pool. A later allocation takes the
/// smallest pooled one that fits, until `flush_working_cache`.
pub struct HostDevice {
    buffers: HashMap<u32, HostBuffer>,
    next_buffer: u32,
    arguments: HashMap<(Kernel, u32), BufferHandle>,
    pool: Vec<Vec<u32>>,
    allocation_limit: Option<usize>,
    live_bytes: usize,
    stats: Arc<DeviceStats>,
}

impl HostDevice {
    pub fn new() -> HostDevice {
        HostDevice {
            buffers: HashMap::new(),
            next_buffer: 0,
            arguments: HashMap::new(),
            pool: Vec::new(),
            allocation_limit: None,
            live_bytes: 0,
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// A device with at most `limit_bytes` of live allocations.
    pub fn with_allocation_limit(limit_bytes: usize) -> HostDevice {
        HostDevice { allocation_limit: Some(limit_bytes), ..HostDevice::new() }
    }

    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }

    fn kernel_of(&self, handle: KernelHandle) -> Result<Kernel, DeviceError> {
        Kernel::ALL.get(handle.0 as usize).copied().ok_or(DeviceError::InvalidKernel(handle))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&HostBuffer, DeviceError> {
        self.buffers.get(&handle.0).ok_or(DeviceError::InvalidBuffer(handle))
    }

    fn argument(&self, kernel: Kernel, index: u32) -> Result<BufferHandle, DeviceError> {
        self.arguments.get(&(kernel, index)).copied().ok_or(DeviceError::UnboundArgument { kernel, index })
    }

    fn view<T: Pod>(&self, kernel: Kernel, index: u32) -> Result<&[T], DeviceError> {
        let buffer = self.buffer(self.argument(kernel, index)?)?;
        let words = &buffer.words[..buffer.size_bytes.min(buffer.words.len() * 4) / 4];
        Ok(bytemuck::cast_slice(words))
    }

    /// Moves a kernel output out of the buffer table for the duration of a
    /// dispatch. Must be handed back with `restore`.
    fn take_writable(&mut self, kernel: Kernel, index: u32) -> Result<(BufferHandle, Vec<u32>), DeviceError> {
        let handle = self.argument(kernel, index)?;
        let buffer = self.buffers.get_mut(&handle.0).ok_or(DeviceError::InvalidBuffer(handle))?;
        if !buffer.access.kernel_can_write() {
            return Err(DeviceError::AccessViolation { kernel, index });
        }
        Ok((handle, std::mem::take(&mut buffer.words)))
    }

    fn restore(&mut self, handle: BufferHandle, words: Vec<u32>) {
        if let Some(buffer) = self.buffers.get_mut(&handle.0) {
            buffer.words = words;
        }
    }

    fn run_single_layer(&self, output: &mut [u32], global: &[usize]) -> Result<(), DeviceError> {
        let kernel = Kernel::SingleLayer;
        kernels::single_layer(
            self.view(kernel, single_layer_args::CONFIG)?,
            self.view(kernel, single_layer_args::WEIGHTS)?,
            self.view(kernel, single_layer_args::BIASES)?,
            self.view(kernel, single_layer_args::PREV_ACTIVATIONS)?,
            bytemuck::cast_slice_mut(output),
            global,
        )
    }

    fn run_forward(&self, layer: usize, activations_and_z: &mut [u32], global: &[usize]) -> Result<(), DeviceError> {
        let kernel = Kernel::ForwardPass;
        kernels::forward_pass(
            self.view(kernel, forward_args::CONFIG)?,
            layer,
            bytemuck::cast_slice_mut(activations_and_z),
            self.view(kernel, forward_args::INPUTS)?,
            self.view(kernel, forward_args::PARAMETERS)?,
            global,
        )
    }

    fn run_backward(
        &self,
        layer: usize,
        delta_k: &mut [u32],
        gradient: &mut [u32],
        global: &[usize],
    ) -> Result<(), DeviceError> {
        let kernel = Kernel::BackwardPass;
        let source = BackwardInputs {
            activations_and_z: self.view(kernel, backward_args::ACTIVATIONS_AND_Z)?,
            desired_outputs: self.view(kernel, backward_args::DESIRED_OUTPUTS)?,
            inputs: self.view(kernel, backward_args::INPUTS)?,
            parameters: self.view(kernel, backward_args::PARAMETERS)?,
        };
        kernels::backward_pass(
            self.view(kernel, backward_args::CONFIG)?,
            layer,
            source,
            bytemuck::cast_slice_mut(delta_k),
            bytemuck::cast_slice_mut(gradient),
            global,
        )
    }

    fn check_range(buffer: &HostBuffer, offset: usize, len: usize) -> Result<(), DeviceError> {
        if offset.checked_add(len).map_or(true, |end| end > buffer.size_bytes) {
            return Err(DeviceError::OutOfBounds { offset, len, size: buffer.size_bytes });
        }
        Ok(())
    }

    fn update_pool_stats(&self) {
        self.stats.pooled_allocations.store(self.pool.len(), Ordering::Relaxed);
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        HostDevice::new()
    }
}

impl ComputeDevice for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn resolve_kernel(&mut self, kernel: Kernel) -> Result<KernelHandle, DeviceError> {
        let index = match kernel {
            Kernel::SingleLayer => 0,
            Kernel::ForwardPass => 1,
            Kernel::BackwardPass => 2,
        };
        Ok(KernelHandle(index))
    }

    fn allocate_buffer(
        &mut self,
        size_bytes: usize,
        access: MemoryAccess,
        initial: Option<&[u8]>,
    ) -> Result<BufferHandle, DeviceError> {
        if let Some(limit) = self.allocation_limit {
            let available = limit.saturating_sub(self.live_bytes);
            if size_bytes > available {
                return Err(DeviceError::OutOfResources { requested: size_bytes, available });
            }
        }
        if let Some(data) = initial {
            if data.len() > size_bytes {
                return Err(DeviceError::OutOfBounds { offset: 0, len: data.len(), size: size_bytes });
            }
        }

        let word_count = (size_bytes + 3) / 4;
        // Best fit: the smallest pooled allocation that is large enough.
        let reuse = self
            .pool
            .iter()
            .enumerate()
            .filter(|(_, w)| w.capacity() >= word_count)
            .min_by_key(|(_, w)| w.capacity())
            .map(|(i, _)| i);
        let mut words = match reuse {
            Some(i) => self.pool.swap_remove(i),
            None => Vec::with_capacity(word_count),
        };
        words.clear();
        words.resize(word_count, 0);
        if let Some(data) = initial {
            bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..data.len()].copy_from_slice(data);
        }

        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(handle.0, HostBuffer { words, size_bytes, access });
        self.live_bytes += size_bytes;
        self.stats.live_allocations.store(self.buffers.len(), Ordering::Relaxed);
        self.update_pool_stats();
        Ok(handle)
    }

    fn set_argument(&mut self, kernel: KernelHandle, index: u32, buffer: BufferHandle) -> Result<(), DeviceError> {
        let kernel = self.kernel_of(kernel)?;
        self.buffer(buffer)?;
        self.arguments.insert((kernel, index), buffer);
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelHandle,
        layer: u32,
        global: &[usize],
        local: &[usize],
    ) -> Result<(), DeviceError> {
        let kind = self.kernel_of(kernel)?;
        let well_formed = !global.is_empty()
            && global.len() == local.len()
            && global.iter().zip(local).all(|(&g, &l)| l > 0 && g % l == 0);
        if !well_formed {
            return Err(DeviceError::InvalidWorkSize { global: global.to_vec(), local: local.to_vec() });
        }
        trace!(kernel = ?kind, layer, ?global, ?local, "host dispatch");

        let layer = layer as usize;
        let result = match kind {
            Kernel::SingleLayer => {
                let (handle, mut output) = self.take_writable(kind, single_layer_args::OUTPUT)?;
                let result = self.run_single_layer(&mut output, global);
                self.restore(handle, output);
                result
            }
            Kernel::ForwardPass => {
                let (handle, mut acts) = self.take_writable(kind, forward_args::ACTIVATIONS_AND_Z)?;
                let result = self.run_forward(layer, &mut acts, global);
                self.restore(handle, acts);
                result
            }
            Kernel::BackwardPass => {
                let (delta_handle, mut deltas) = self.take_writable(kind, backward_args::DELTA_K)?;
                let (grad_handle, mut gradient) = match self.take_writable(kind, backward_args::GRADIENT) {
                    Ok(taken) => taken,
                    Err(err) => {
                        self.restore(delta_handle, deltas);
                        return Err(err);
                    }
                };
                let result = self.run_backward(layer, &mut deltas, &mut gradient, global);
                self.restore(delta_handle, deltas);
                self.restore(grad_handle, gradient);
                result
            }
        };
        self.stats.dispatches.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn upload_partial(
        &mut self,
        buffer: BufferHandle,
        offset_bytes: usize,
        data: &[u8],
        _blocking: bool,
    ) -> Result<(), DeviceError> {
        let target = self.buffers.get_mut(&buffer.0).ok_or(DeviceError::InvalidBuffer(buffer))?;
        HostDevice::check_range(target, offset_bytes, data.len())?;
        bytemuck::cast_slice_mut::<u32, u8>(&mut target.words)[offset_bytes..offset_bytes + data.len()]
            .copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferHandle, offset_bytes: usize, out: &mut [u8]) -> Result<(), DeviceError> {
        let source = self.buffer(buffer)?;
        HostDevice::check_range(source, offset_bytes, out.len())?;
        out.copy_from_slice(&bytemuck::cast_slice::<u32, u8>(&source.words)[offset_bytes..offset_bytes + out.len()]);
        Ok(())
    }

    fn release_transient_allocations(&mut self) {
        self.pool.extend(self.buffers.drain().map(|(_, buffer)| buffer.words));
        self.arguments.clear();
        self.live_bytes = 0;
        self.stats.live_allocations.store(0, Ordering::Relaxed);
        self.update_pool_stats();
    }

    fn flush_working_cache(&mut self) {
        self.pool.clear();
        self.update_pool_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_read_round_trips_bytes() {
        let mut device = HostDevice::new();
        let buf = device.allocate_buffer(16, MemoryAccess::ReadWrite, None).unwrap();
        let values = [1.5_f32, -2.0];
        device.upload_partial(buf, 8, bytemuck::cast_slice(&values), true).unwrap();
        let mut out = [0.0_f32; 4];
        device.read_buffer(buf, 0, bytemuck::cast_slice_mut(&mut out)).unwrap();
        assert_eq!(out, [0.0, 0.0, 1.5, -2.0]);
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut device = HostDevice::new();
        let buf = device.allocate_buffer(8, MemoryAccess::ReadOnly, None).unwrap();
        let mut out = [0u8; 4];
        assert!(matches!(device.read_buffer(buf, 6, &mut out), Err(DeviceError::OutOfBounds { .. })));
        assert!(matches!(device.upload_partial(buf, 8, &[1], true), Err(DeviceError::OutOfBounds { .. })));
    }

    #[test]
    fn allocation_limit_is_enforced() {
        let mut device = HostDevice::with_allocation_limit(64);
        device.allocate_buffer(48, MemoryAccess::ReadWrite, None).unwrap();
        let err = device.allocate_buffer(32, MemoryAccess::ReadWrite, None).unwrap_err();
        assert_eq!(err, DeviceError::OutOfResources { requested: 32, available: 16 });
    }

    #[test]
    fn released_buffers_are_pooled_until_flushed() {
        let mut device = HostDevice::new();
        let stats = device.stats();
        device.allocate_buffer(64, MemoryAccess::ReadWrite, None).unwrap();
        device.allocate_buffer(32, MemoryAccess::ReadOnly, Some(&[7u8; 32])).unwrap();
        assert_eq!(stats.live_allocations(), 2);

        device.release_transient_allocations();
        assert_eq!(stats.live_allocations(), 0);
        assert_eq!(stats.pooled_allocations(), 2);

        // Reused memory must come back zeroed.
        let buf = device.allocate_buffer(32, MemoryAccess::ReadWrite, None).unwrap();
        assert_eq!(stats.pooled_allocations(), 1);
        let mut out = [1u8; 32];
        device.read_buffer(buf, 0, &mut out).unwrap();
        assert_eq!(out, [0u8; 32]);

        device.flush_working_cache();
        assert_eq!(stats.pooled_allocations(), 0);
    }

    #[test]
    fn small_requests_take_the_smallest_pooled_buffer() {
        let mut device = HostDevice::new();
        let stats = device.stats();
        for _ in 0..4 {
            device.allocate_buffer(16, MemoryAccess::ReadWrite, None).unwrap();
            device.allocate_buffer(4096, MemoryAccess::ReadWrite, None).unwrap();
            device.release_transient_allocations();
            assert_eq!(stats.pooled_allocations(), 2);
        }

        // The small request must not take the big buffer from the big one.
        for _ in 0..4 {
            device.allocate_buffer(12, MemoryAccess::ReadWrite, None).unwrap();
            device.allocate_buffer(4000, MemoryAccess::ReadWrite, None).unwrap();
            assert_eq!(stats.pooled_allocations(), 0);
            device.release_transient_allocations();
        }
        assert_eq!(stats.pooled_allocations(), 2);
    }

    #[test]
    fn work_size_must_be_whole_groups() {
        let mut device = HostDevice::new();
        let kernel = device.resolve_kernel(Kernel::SingleLayer).unwrap();
        let err = device.dispatch(kernel, 0, &[33], &[32]).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidWorkSize { .. }));
    }

    #[test]
    fn unbound_argument_is_reported() {
        let mut device = HostDevice::new();
        let kernel = device.resolve_kernel(Kernel::ForwardPass).unwrap();
        let err = device.dispatch(kernel, 0, &[8, 8], &[8, 8]).unwrap_err();
        assert!(matches!(err, DeviceError::UnboundArgument { kernel: Kernel::ForwardPass, .. }));
    }

    #[test]
    fn kernels_cannot_write_read_only_buffers() {
        let mut device = HostDevice::new();
        let kernel = device.resolve_kernel(Kernel::SingleLayer).unwrap();
        let out = device.allocate_buffer(4, MemoryAccess::ReadOnly, None).unwrap();
        device.set_argument(kernel, single_layer_args::OUTPUT, out).unwrap();
        let err = device.dispatch(kernel, 0, &[32], &[32]).unwrap_err();
        assert_eq!(err, DeviceError::AccessViolation { kernel: Kernel::SingleLayer, index: single_layer_args::OUTPUT });
    }
}
