// Device failures abort the minibatch and leave nothing allocated behind.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{assert_gradients_close, random_examples, random_network};
use ferrite_grad::device::{BufferHandle, ComputeDevice, DeviceError, Kernel, KernelHandle, MemoryAccess};
use ferrite_grad::{ActivationFunction, CostFunction, GradientEngine, GradientError, HostDevice};

/// Which call of a `FaultyDevice` fails, counted from 1.
#[derive(Clone, Copy)]
enum Fault {
    Dispatch(usize),
    Upload(usize),
    ReadBack(usize),
}

/// Wraps a `HostDevice` and fails one chosen call.
struct FaultyDevice {
    inner: HostDevice,
    fault: Fault,
    dispatches: usize,
    uploads: usize,
    reads: usize,
    releases: Arc<AtomicUsize>,
}

impl FaultyDevice {
    fn new(inner: HostDevice, fault: Fault, releases: Arc<AtomicUsize>) -> FaultyDevice {
        FaultyDevice { inner, fault, dispatches: 0, uploads: 0, reads: 0, releases }
    }
}

impl ComputeDevice for FaultyDevice {
    fn name(&self) -> &str {
        "faulty"
    }

    fn resolve_kernel(&mut self, kernel: Kernel) -> Result<KernelHandle, DeviceError> {
        self.inner.resolve_kernel(kernel)
    }

    fn allocate_buffer(
        &mut self,
        size_bytes: usize,
        access: MemoryAccess,
        initial: Option<&[u8]>,
    ) -> Result<BufferHandle, DeviceError> {
        self.inner.allocate_buffer(size_bytes, access, initial)
    }

    fn set_argument(&mut self, kernel: KernelHandle, index: u32, buffer: BufferHandle) -> Result<(), DeviceError> {
        self.inner.set_argument(kernel, index, buffer)
    }

    fn dispatch(&mut self, kernel: KernelHandle, layer: u32, global: &[usize], local: &[usize]) -> Result<(), DeviceError> {
        self.dispatches += 1;
        if let Fault::Dispatch(n) = self.fault {
            if self.dispatches == n {
                return Err(DeviceError::InvalidLayer { layer: layer as usize, layers: 0 });
            }
        }
        self.inner.dispatch(kernel, layer, global, local)
    }

    fn upload_partial(&mut self, buffer: BufferHandle, offset_bytes: usize, data: &[u8], blocking: bool) -> Result<(), DeviceError> {
        self.uploads += 1;
        if let Fault::Upload(n) = self.fault {
            if self.uploads == n {
                return Err(DeviceError::OutOfBounds { offset: offset_bytes, len: data.len(), size: 0 });
            }
        }
        self.inner.upload_partial(buffer, offset_bytes, data, blocking)
    }

    fn read_buffer(&mut self, buffer: BufferHandle, offset_bytes: usize, out: &mut [u8]) -> Result<(), DeviceError> {
        self.reads += 1;
        if let Fault::ReadBack(n) = self.fault {
            if self.reads == n {
                return Err(DeviceError::InvalidBuffer(buffer));
            }
        }
        self.inner.read_buffer(buffer, offset_bytes, out)
    }

    fn release_transient_allocations(&mut self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.inner.release_transient_allocations();
    }
}

#[test]
fn out_of_memory_aborts_minibatch_and_releases_everything() {
    // Big enough for one single-layer dispatch of a 2-2-1 network, too small
    // for the whole minibatch.
    let device = HostDevice::with_allocation_limit(64);
    let stats = device.stats();
    let mut engine = GradientEngine::with_device(Box::new(device)).unwrap();
    let network = random_network(1, 2, &[2, 1], ActivationFunction::Sigmoid);
    let examples = random_examples(2, 4, 2, 1);

    let err = engine.compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared).unwrap_err();
    assert!(err.is_device_failure());
    assert!(matches!(err, GradientError::DeviceExecution(DeviceError::OutOfResources { .. })));
    assert_eq!(stats.live_allocations(), 0);
    assert_eq!(stats.dispatches(), 0);

    // The engine stays usable for work that fits.
    let expected = GradientEngine::scalar().feed_forward(&network, &examples[0].input).unwrap();
    let actual = engine.feed_forward(&network, &examples[0].input).unwrap();
    assert_eq!(expected, actual);
    assert_eq!(stats.live_allocations(), 0);
}

/// Runs one minibatch against a device that fails at `fault`, then checks the
/// failure was reported, everything was released once, and a retry succeeds.
fn assert_fault_aborts_minibatch(fault: Fault) -> usize {
    let network = random_network(3, 3, &[4, 4, 2], ActivationFunction::Tanh);
    let examples = random_examples(4, 5, 3, 2);

    let releases = Arc::new(AtomicUsize::new(0));
    let inner = HostDevice::new();
    let stats = inner.stats();
    let mut engine = GradientEngine::with_device(Box::new(FaultyDevice::new(inner, fault, Arc::clone(&releases)))).unwrap();

    let err = engine.compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared).unwrap_err();
    assert!(err.is_device_failure());
    assert_eq!(releases.load(Ordering::Relaxed), 1);
    assert_eq!(stats.live_allocations(), 0);
    let dispatched = stats.dispatches();

    // The fault fires once; the next call goes through and matches the host.
    let expected = GradientEngine::scalar()
        .compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared)
        .unwrap();
    let actual = engine.compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared).unwrap();
    assert_gradients_close(&expected, &actual);
    assert_eq!(releases.load(Ordering::Relaxed), 2);
    assert_eq!(stats.live_allocations(), 0);
    dispatched
}

#[test]
fn failed_forward_dispatch_releases_allocations() {
    assert_eq!(assert_fault_aborts_minibatch(Fault::Dispatch(2)), 1);
}

#[test]
fn failed_backward_dispatch_releases_allocations() {
    assert_eq!(assert_fault_aborts_minibatch(Fault::Dispatch(5)), 4);
}

#[test]
fn failed_input_upload_releases_allocations() {
    // Third of the five per-example uploads; nothing has been dispatched yet.
    assert_eq!(assert_fault_aborts_minibatch(Fault::Upload(3)), 0);
}

#[test]
fn failed_read_back_releases_allocations() {
    // Every dispatch ran; only the gradient read-back fails.
    assert_eq!(assert_fault_aborts_minibatch(Fault::ReadBack(1)), 6);
}

#[test]
fn invalid_work_group_config_is_rejected_at_attach() {
    let config = ferrite_grad::EngineConfig { layer_group_size: 0, tile_group: [8, 8] };
    let result = GradientEngine::with_device_and_config(Box::new(HostDevice::new()), config);
    assert!(matches!(result, Err(GradientError::Config(_))));
}
