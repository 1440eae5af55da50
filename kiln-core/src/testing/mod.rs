//! Test doubles for the drain engine.
//!
//! [`RecordingBackend`] stands in for a device driver and keeps a log of
//! every call, so tests can assert exactly which device operations a drain
//! performed and with what arguments. [`CountingAllocator`] does the same
//! for node storage reclamation.
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::testing::{recording_device, BackendCall};
//!
//! let (device, backend) = recording_device(DeviceCapabilities::empty());
//! // enqueue and drain...
//! assert!(matches!(backend.calls()[0], BackendCall::Read { .. }));
//! ```

mod recording;

pub use recording::{BackendCall, RecordingBackend};

use crate::command::{NodeAllocator, NodeStorage};
use crate::device::{Device, DeviceCapabilities};
use crate::memory::{MemFlags, MemObject};
use crate::types::{CommandId, DevicePtr};
use parking_lot::Mutex;
use std::sync::Arc;

/// Allocator that remembers which nodes it took back.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    freed: Mutex<Vec<CommandId>>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freed command ids, in the order they were returned.
    pub fn freed(&self) -> Vec<CommandId> {
        self.freed.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.freed.lock().len()
    }
}

impl NodeAllocator for CountingAllocator {
    fn free(&self, storage: NodeStorage) {
        self.freed.lock().push(storage.id);
    }
}

/// A device backed by a fresh [`RecordingBackend`], plus the backend.
pub fn recording_device(capabilities: DeviceCapabilities) -> (Arc<Device>, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new());
    let device = Device::new(0, "recording", Arc::clone(&backend) as _)
        .with_capabilities(capabilities);
    (Arc::new(device), backend)
}

/// A device without SVM capabilities whose backend nobody inspects.
pub fn test_device() -> Arc<Device> {
    recording_device(DeviceCapabilities::empty()).0
}

/// A buffer with a device allocation at index 0.
pub fn test_buffer(flags: MemFlags, size: usize) -> Arc<MemObject> {
    Arc::new(MemObject::new(flags, size).with_device_ptr(0, DevicePtr::new(0xd000_0000)))
}
