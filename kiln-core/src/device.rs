//! Compute devices.
//!
//! A [`Device`] pairs an identity and a capability set with the backend that
//! executes commands for it. Command nodes hold an `Arc<Device>` so dispatch
//! never needs to look the device up.

use crate::backend::DeviceBackend;
use crate::types::DeviceId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Shared virtual memory capabilities of a device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DeviceCapabilities: u32 {
        /// Coarse-grained SVM buffers (explicit map/unmap required).
        const SVM_COARSE_GRAIN_BUFFER = 1 << 0;
        /// Fine-grained SVM buffers.
        const SVM_FINE_GRAIN_BUFFER = 1 << 1;
        /// Fine-grained system allocations.
        const SVM_FINE_GRAIN_SYSTEM = 1 << 2;
        /// Atomics are coherent between host and device.
        const SVM_ATOMICS = 1 << 3;
    }
}

/// A compute device and the backend that drives it.
pub struct Device {
    id: DeviceId,
    /// Position of this device in its context; indexes per-device pointers.
    index: usize,
    name: String,
    capabilities: DeviceCapabilities,
    backend: Arc<dyn DeviceBackend>,
}

impl Device {
    /// Create a device with no SVM capabilities.
    pub fn new(index: usize, name: impl Into<String>, backend: Arc<dyn DeviceBackend>) -> Self {
        Self {
            id: DeviceId::next(),
            index,
            name: name.into(),
            capabilities: DeviceCapabilities::empty(),
            backend,
        }
    }

    /// Set the device capabilities.
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Device identifier.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Index of the device within its context.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Human-readable device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SVM capabilities.
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// The backend executing commands for this device.
    pub fn backend(&self) -> &dyn DeviceBackend {
        self.backend.as_ref()
    }

    /// Whether mapping memory on this device is a logical no-op.
    ///
    /// True for unified memory: fine-grained SVM with coherent atomics.
    pub fn mmap_is_nop(&self) -> bool {
        self.capabilities.intersects(
            DeviceCapabilities::SVM_FINE_GRAIN_BUFFER | DeviceCapabilities::SVM_FINE_GRAIN_SYSTEM,
        ) && self.capabilities.contains(DeviceCapabilities::SVM_ATOMICS)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;

    fn device(caps: DeviceCapabilities) -> Device {
        Device::new(0, "test", Arc::new(RecordingBackend::new())).with_capabilities(caps)
    }

    #[test]
    fn unified_memory_requires_fine_grain_and_atomics() {
        assert!(!device(DeviceCapabilities::empty()).mmap_is_nop());
        assert!(!device(DeviceCapabilities::SVM_FINE_GRAIN_BUFFER).mmap_is_nop());
        assert!(!device(DeviceCapabilities::SVM_ATOMICS).mmap_is_nop());
        assert!(
            device(DeviceCapabilities::SVM_FINE_GRAIN_BUFFER | DeviceCapabilities::SVM_ATOMICS)
                .mmap_is_nop()
        );
        assert!(
            device(DeviceCapabilities::SVM_FINE_GRAIN_SYSTEM | DeviceCapabilities::SVM_ATOMICS)
                .mmap_is_nop()
        );
    }

    #[test]
    fn devices_get_distinct_ids() {
        let a = device(DeviceCapabilities::empty());
        let b = device(DeviceCapabilities::empty());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "test");
    }
}
