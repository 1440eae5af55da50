//! Memory objects (buffers and images) as seen by the drain engine.
//!
//! The engine touches a memory object in three ways: it reads the per-device
//! allocation address, it consults the allocation flags to decide whether an
//! unmap needs device work, and it unlinks mappings when an unmap completes.
//! Lifetime is plain shared ownership: a command node holds an
//! `Arc<MemObject>` and the dispatcher drops it when the node is finalized.

use crate::device::Device;
use crate::error::{KilnError, Result};
use crate::types::{DevicePtr, HostPtr, MemId};
use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

bitflags! {
    /// Allocation flags of a memory object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MemFlags: u32 {
        /// Readable and writable by kernels.
        const READ_WRITE = 1 << 0;
        /// Writable by kernels only.
        const WRITE_ONLY = 1 << 1;
        /// Readable by kernels only.
        const READ_ONLY = 1 << 2;
        /// Backed by caller-provided host memory.
        const USE_HOST_PTR = 1 << 3;
        /// Allocated from host-accessible memory.
        const ALLOC_HOST_PTR = 1 << 4;
        /// Initialized from caller-provided host memory.
        const COPY_HOST_PTR = 1 << 5;
    }
}

/// A host-visible window onto part of a memory object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    /// Host address the region is visible at.
    pub host_ptr: HostPtr,
    /// Offset of the region inside the memory object.
    pub offset: usize,
    /// Size of the region in bytes.
    pub size: usize,
}

impl Mapping {
    /// Create a new mapping record.
    pub fn new(host_ptr: HostPtr, offset: usize, size: usize) -> Self {
        Self {
            host_ptr,
            offset,
            size,
        }
    }
}

/// A buffer or image.
#[derive(Debug)]
pub struct MemObject {
    id: MemId,
    flags: MemFlags,
    size: usize,
    host_ptr: HostPtr,
    /// Allocation address on each device, indexed by [`Device::index`].
    device_ptrs: Vec<DevicePtr>,
    /// Live mappings, in creation order.
    mappings: Mutex<Vec<Arc<Mapping>>>,
    map_count: AtomicUsize,
}

impl MemObject {
    /// Create a memory object with no per-device allocations.
    pub fn new(flags: MemFlags, size: usize) -> Self {
        Self {
            id: MemId::next(),
            flags,
            size,
            host_ptr: HostPtr::NULL,
            device_ptrs: Vec::new(),
            mappings: Mutex::new(Vec::new()),
            map_count: AtomicUsize::new(0),
        }
    }

    /// Set the backing host pointer.
    pub fn with_host_ptr(mut self, host_ptr: HostPtr) -> Self {
        self.host_ptr = host_ptr;
        self
    }

    /// Set the allocation address for the device at `index`.
    pub fn with_device_ptr(mut self, index: usize, ptr: DevicePtr) -> Self {
        if self.device_ptrs.len() <= index {
            self.device_ptrs.resize(index + 1, DevicePtr::NULL);
        }
        self.device_ptrs[index] = ptr;
        self
    }

    /// Memory object identifier.
    pub fn id(&self) -> MemId {
        self.id
    }

    /// Allocation flags.
    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Backing host pointer, null unless created from host memory.
    pub fn host_ptr(&self) -> HostPtr {
        self.host_ptr
    }

    /// Allocation address on `device`, or null if none was made.
    pub fn device_ptr(&self, device: &Device) -> DevicePtr {
        self.device_ptrs
            .get(device.index())
            .copied()
            .unwrap_or(DevicePtr::NULL)
    }

    /// Whether host and device views of this object are always coherent.
    pub fn is_host_coherent(&self) -> bool {
        self.flags
            .intersects(MemFlags::USE_HOST_PTR | MemFlags::ALLOC_HOST_PTR)
    }

    /// Link a mapping and bump the live-map counter.
    pub fn add_mapping(&self, mapping: Arc<Mapping>) {
        self.mappings.lock().push(mapping);
        self.map_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Unlink a mapping and drop the live-map counter.
    ///
    /// The mapping is matched by identity, not by value. The counter drops
    /// (saturating at zero) even when `mapping` is not linked; that case
    /// still reports `MappingNotFound` so the caller can log it.
    pub fn remove_mapping(&self, mapping: &Arc<Mapping>) -> Result<()> {
        let unlinked = {
            let mut mappings = self.mappings.lock();
            match mappings.iter().position(|m| Arc::ptr_eq(m, mapping)) {
                Some(position) => {
                    mappings.remove(position);
                    true
                }
                None => false,
            }
        };

        let previous = self
            .map_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous.is_err() {
            tracing::warn!(mem_id = %self.id, "Live-map counter already zero on unmap");
        }

        if unlinked {
            Ok(())
        } else {
            Err(KilnError::MappingNotFound { mem_id: self.id })
        }
    }

    /// Number of live mappings.
    pub fn map_count(&self) -> usize {
        self.map_count.load(Ordering::SeqCst)
    }

    /// Snapshot of the live mappings.
    pub fn mappings(&self) -> Vec<Arc<Mapping>> {
        self.mappings.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;

    #[test]
    fn host_coherence_follows_flags() {
        assert!(MemObject::new(MemFlags::USE_HOST_PTR, 16).is_host_coherent());
        assert!(MemObject::new(MemFlags::ALLOC_HOST_PTR, 16).is_host_coherent());
        assert!(!MemObject::new(MemFlags::READ_WRITE, 16).is_host_coherent());
        assert!(!MemObject::new(MemFlags::COPY_HOST_PTR, 16).is_host_coherent());
    }

    #[test]
    fn device_ptr_by_index() {
        let backend = Arc::new(RecordingBackend::new());
        let dev0 = Device::new(0, "d0", backend.clone());
        let dev2 = Device::new(2, "d2", backend.clone());
        let dev5 = Device::new(5, "d5", backend);

        let mem = MemObject::new(MemFlags::READ_WRITE, 64)
            .with_device_ptr(0, DevicePtr::new(0x100))
            .with_device_ptr(2, DevicePtr::new(0x200));

        assert_eq!(mem.device_ptr(&dev0), DevicePtr::new(0x100));
        assert_eq!(mem.device_ptr(&dev2), DevicePtr::new(0x200));
        assert!(mem.device_ptr(&dev5).is_null());
    }

    #[test]
    fn mapping_lifecycle() {
        let mem = MemObject::new(MemFlags::READ_WRITE, 64);
        let first = Arc::new(Mapping::new(HostPtr::new(0x1000), 0, 32));
        let second = Arc::new(Mapping::new(HostPtr::new(0x1000), 0, 32));

        mem.add_mapping(first.clone());
        mem.add_mapping(second.clone());
        assert_eq!(mem.map_count(), 2);

        // Equal by value, but only the identical record is removed.
        mem.remove_mapping(&second).unwrap();
        assert_eq!(mem.map_count(), 1);
        assert!(Arc::ptr_eq(&mem.mappings()[0], &first));

        mem.remove_mapping(&first).unwrap();
        assert_eq!(mem.map_count(), 0);
        assert!(matches!(
            mem.remove_mapping(&first),
            Err(KilnError::MappingNotFound { .. })
        ));
        assert_eq!(mem.map_count(), 0);
    }

    #[test]
    fn unlinked_unmap_still_drops_the_counter() {
        let mem = MemObject::new(MemFlags::READ_WRITE, 64);
        let linked = Arc::new(Mapping::new(HostPtr::new(0x1000), 0, 32));
        mem.add_mapping(linked.clone());

        let stranger = Arc::new(Mapping::new(HostPtr::new(0x1000), 0, 32));
        assert!(mem.remove_mapping(&stranger).is_err());
        assert_eq!(mem.map_count(), 0);
        assert!(Arc::ptr_eq(&mem.mappings()[0], &linked));
    }
}
