pub mod device;
pub mod host;
pub mod kernels;

pub use device::{BufferHandle, ComputeDevice, DeviceError, Kernel, KernelHandle, MemoryAccess};
pub use host::{DeviceStats, HostDevice};
