use std::ops::{Deref, DerefMut};

use crate::device::{ComputeDevice, DeviceError, Kernel, KernelHandle};

/// Kernel handles resolved once when a device is attached.
#[derive(Debug, Clone, Copy)]
pub struct KernelTable {
    pub single_layer: KernelHandle,
    pub forward_pass: KernelHandle,
    pub backward_pass: KernelHandle,
}

impl KernelTable {
    pub fn resolve(device: &mut dyn ComputeDevice) -> Result<KernelTable, DeviceError> {
        Ok(KernelTable {
            single_layer: device.resolve_kernel(Kernel::SingleLayer)?,
            forward_pass: device.resolve_kernel(Kernel::ForwardPass)?,
            backward_pass: device.resolve_kernel(Kernel::BackwardPass)?,
        })
    }
}

/// An attached device together with its resolved kernels.
pub struct DeviceSession {
    device: Box<dyn ComputeDevice>,
    pub kernels: KernelTable,
}

impl DeviceSession {
    pub fn attach(mut device: Box<dyn ComputeDevice>) -> Result<DeviceSession, DeviceError> {
        let kernels = KernelTable::resolve(device.as_mut())?;
        Ok(DeviceSession { device, kernels })
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }

    /// Opens a scope whose device allocations are released when it drops,
    /// whether the work inside it succeeded or not.
    pub fn scope(&mut self) -> TransientScope<'_> {
        TransientScope { device: self.device.as_mut() }
    }

    pub fn flush_working_cache(&mut self) {
        self.device.flush_working_cache();
    }
}

pub struct TransientScope<'d> {
    device: &'d mut (dyn ComputeDevice + 'static),
}

impl Deref for TransientScope<'_> {
    type Target = dyn ComputeDevice + 'static;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl DerefMut for TransientScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for TransientScope<'_> {
    fn drop(&mut self) {
        self.device.release_transient_allocations();
    }
}
