//! A device backend that records its calls.

use crate::backend::DeviceBackend;
use crate::command::{CommandNode, KernelLaunch, NativeKernel};
use crate::types::{CommandId, DevicePtr, HostPtr, KernelId, Rect3, RectTransfer, SvmPtr};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One call made into a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendCall {
    Read {
        host_ptr: HostPtr,
        device_ptr: DevicePtr,
        offset: usize,
        size: usize,
    },
    Write {
        host_ptr: HostPtr,
        device_ptr: DevicePtr,
        offset: usize,
        size: usize,
    },
    Copy {
        src_ptr: DevicePtr,
        src_offset: usize,
        dst_ptr: DevicePtr,
        dst_offset: usize,
        size: usize,
    },
    ReadRect {
        host_ptr: HostPtr,
        device_ptr: DevicePtr,
        transfer: RectTransfer,
    },
    WriteRect {
        host_ptr: HostPtr,
        device_ptr: DevicePtr,
        transfer: RectTransfer,
    },
    Run {
        kernel_id: KernelId,
        work_dim: u32,
        global_size: Rect3,
        local_size: Rect3,
    },
    RunNative {
        args_len: usize,
    },
    FillRect {
        device_ptr: DevicePtr,
        origin: Rect3,
        region: Rect3,
        row_pitch: usize,
        slice_pitch: usize,
        pixel: Vec<u8>,
    },
    Memfill {
        device_ptr: DevicePtr,
        size: usize,
        offset: usize,
        pattern: Vec<u8>,
    },
    MapMem {
        device_ptr: DevicePtr,
        offset: usize,
        size: usize,
        host_ptr: HostPtr,
    },
    UnmapMem {
        host_ptr: HostPtr,
        device_ptr: DevicePtr,
        size: usize,
    },
    FreePtr {
        ptr: SvmPtr,
    },
}

/// Backend that performs no device work and remembers every call in order.
///
/// Native kernels are still invoked so tests can observe them running.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    compiled: Mutex<Vec<CommandId>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Commands passed to the compile hook, in order.
    pub fn compiled(&self) -> Vec<CommandId> {
        self.compiled.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
        self.compiled.lock().clear();
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

impl DeviceBackend for RecordingBackend {
    fn read(&self, host_ptr: HostPtr, device_ptr: DevicePtr, offset: usize, size: usize) {
        self.record(BackendCall::Read {
            host_ptr,
            device_ptr,
            offset,
            size,
        });
    }

    fn write(&self, host_ptr: HostPtr, device_ptr: DevicePtr, offset: usize, size: usize) {
        self.record(BackendCall::Write {
            host_ptr,
            device_ptr,
            offset,
            size,
        });
    }

    fn copy(
        &self,
        src_ptr: DevicePtr,
        src_offset: usize,
        dst_ptr: DevicePtr,
        dst_offset: usize,
        size: usize,
    ) {
        self.record(BackendCall::Copy {
            src_ptr,
            src_offset,
            dst_ptr,
            dst_offset,
            size,
        });
    }

    fn read_rect(&self, host_ptr: HostPtr, device_ptr: DevicePtr, transfer: &RectTransfer) {
        self.record(BackendCall::ReadRect {
            host_ptr,
            device_ptr,
            transfer: *transfer,
        });
    }

    fn write_rect(&self, host_ptr: HostPtr, device_ptr: DevicePtr, transfer: &RectTransfer) {
        self.record(BackendCall::WriteRect {
            host_ptr,
            device_ptr,
            transfer: *transfer,
        });
    }

    fn run(&self, launch: &KernelLaunch) {
        self.record(BackendCall::Run {
            kernel_id: launch.kernel.id(),
            work_dim: launch.work_dim,
            global_size: launch.global_size,
            local_size: launch.local_size,
        });
    }

    fn run_native(&self, native: &NativeKernel) {
        self.record(BackendCall::RunNative {
            args_len: native.args.len(),
        });
        (native.func)(&native.args);
    }

    fn fill_rect(
        &self,
        device_ptr: DevicePtr,
        origin: Rect3,
        region: Rect3,
        row_pitch: usize,
        slice_pitch: usize,
        pixel: &[u8],
    ) {
        self.record(BackendCall::FillRect {
            device_ptr,
            origin,
            region,
            row_pitch,
            slice_pitch,
            pixel: pixel.to_vec(),
        });
    }

    fn memfill(&self, device_ptr: DevicePtr, size: usize, offset: usize, pattern: &[u8]) {
        self.record(BackendCall::Memfill {
            device_ptr,
            size,
            offset,
            pattern: pattern.to_vec(),
        });
    }

    fn map_mem(&self, device_ptr: DevicePtr, offset: usize, size: usize, host_ptr: HostPtr) {
        self.record(BackendCall::MapMem {
            device_ptr,
            offset,
            size,
            host_ptr,
        });
    }

    fn unmap_mem(&self, host_ptr: HostPtr, device_ptr: DevicePtr, size: usize) {
        self.record(BackendCall::UnmapMem {
            host_ptr,
            device_ptr,
            size,
        });
    }

    fn free_ptr(&self, ptr: SvmPtr) {
        self.record(BackendCall::FreePtr { ptr });
    }

    fn compile_submitted_kernels(&self, node: &CommandNode) {
        self.compiled.lock().push(node.id());
    }
}
