use thiserror::Error;

/// The fixed set of programs a compute device must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// `a = σ(W·prev + b)` for one layer and one input vector.
    SingleLayer,
    /// One layer of the training forward pass, for every sample of a minibatch.
    ForwardPass,
    /// One layer of the training backward pass, for every sample of a minibatch.
    BackwardPass,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::SingleLayer, Kernel::ForwardPass, Kernel::BackwardPass];
}

/// Opaque handle to a kernel, resolved once when a device is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelHandle(pub u32);

/// Opaque handle to a device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// How kernels may touch a buffer. Host uploads and reads are always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl MemoryAccess {
    pub fn kernel_can_write(self) -> bool {
        !matches!(self, MemoryAccess::ReadOnly)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfResources { requested: usize, available: usize },

    #[error("unknown or released buffer {0:?}")]
    InvalidBuffer(BufferHandle),

    #[error("unknown kernel handle {0:?}")]
    InvalidKernel(KernelHandle),

    #[error("kernel {kernel:?} has no buffer bound at argument {index}")]
    UnboundArgument { kernel: Kernel, index: u32 },

    #[error("global size {global:?} is not a multiple of local size {local:?}")]
    InvalidWorkSize { global: Vec<usize>, local: Vec<usize> },

    #[error("kernel {kernel:?} tried to write read-only buffer at argument {index}")]
    AccessViolation { kernel: Kernel, index: u32 },

    #[error("access of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("dispatch targets layer {layer} of a {layers}-layer network")]
    InvalidLayer { layer: usize, layers: usize },

    #[error("device does not implement {kind} function id {id}")]
    UnknownFunctionId { kind: &'static str, id: i32 },
}

/// Narrow contract to a data-parallel compute device.
///
/// Every allocation made through `allocate_buffer` is transient: it lives
/// until `release_transient_allocations` is called. Dispatches are executed
/// in submission order on a single stream, so a dispatch always observes the
/// writes of every earlier one.
pub trait ComputeDevice: Send {
    fn name(&self) -> &str;

    fn resolve_kernel(&mut self, kernel: Kernel) -> Result<KernelHandle, DeviceError>;

    /// Allocates `size_bytes`, optionally initialized from `initial` (which
    /// must not be longer than the allocation). Uninitialized memory reads as zero.
    fn allocate_buffer(
        &mut self,
        size_bytes: usize,
        access: MemoryAccess,
        initial: Option<&[u8]>,
    ) -> Result<BufferHandle, DeviceError>;

    fn set_argument(&mut self, kernel: KernelHandle, index: u32, buffer: BufferHandle) -> Result<(), DeviceError>;

    /// Runs `kernel` over `global` lanes in groups of `local`.
    ///
    /// `layer` selects which layer of a flattened network the dispatch works
    /// on; kernels that process a single layer ignore it.
    fn dispatch(
        &mut self,
        kernel: KernelHandle,
        layer: u32,
        global: &[usize],
        local: &[usize],
    ) -> Result<(), DeviceError>;

    fn upload_partial(
        &mut self,
        buffer: BufferHandle,
        offset_bytes: usize,
        data: &[u8],
        blocking: bool,
    ) -> Result<(), DeviceError>;

    /// Blocking read of `out.len()` bytes starting at `offset_bytes`.
    fn read_buffer(&mut self, buffer: BufferHandle, offset_bytes: usize, out: &mut [u8]) -> Result<(), DeviceError>;

    fn release_transient_allocations(&mut self);

    /// Drops any memory the device keeps around for reuse.
    fn flush_working_cache(&mut self) {}
}
