//! Kind-specific command payloads.
//!
//! Payloads own everything their command needs for the duration of
//! execution: strong references to memory objects and kernels, argument
//! blocks, fill patterns. All of it is dropped together when the node is
//! finalized.

use crate::kernel::{Kernel, KernelArg};
use crate::memory::{Mapping, MemObject};
use crate::types::{DevicePtr, HostPtr, QueueId, Rect3, RectTransfer, SvmPtr};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Host function run by a native kernel command.
pub type NativeFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// User callback that frees SVM pointers in place of the device.
///
/// Receives the queue the command was enqueued on, or `None` for a command
/// dispatched without one.
pub type SvmFreeFn = Arc<dyn Fn(Option<QueueId>, &[SvmPtr]) + Send + Sync>;

/// Read or write between host memory and a buffer.
#[derive(Debug)]
pub struct BufferTransfer {
    pub buffer: Arc<MemObject>,
    pub host_ptr: HostPtr,
    pub device_ptr: DevicePtr,
    pub offset: usize,
    pub size: usize,
}

/// Copy between two buffers.
#[derive(Debug)]
pub struct BufferCopy {
    pub src_buffer: Arc<MemObject>,
    pub dst_buffer: Arc<MemObject>,
    pub src_ptr: DevicePtr,
    pub src_offset: usize,
    pub dst_ptr: DevicePtr,
    pub dst_offset: usize,
    pub size: usize,
}

/// Map part of a buffer or image into host memory.
///
/// The mapping record is linked into the memory object when the command is
/// enqueued; executing the command only makes the bytes visible.
#[derive(Debug)]
pub struct MapCommand {
    pub mem: Arc<MemObject>,
    pub mapping: Arc<Mapping>,
    pub device_ptr: DevicePtr,
    /// Whether the memory object is an image.
    pub is_image: bool,
}

/// Read or write an image region.
#[derive(Debug)]
pub struct ImageTransfer {
    pub image: Arc<MemObject>,
    pub host_ptr: HostPtr,
    pub device_ptr: DevicePtr,
    pub origin: Rect3,
    pub region: Rect3,
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

impl ImageTransfer {
    /// Host and device layouts are identical for image transfers.
    pub fn rect(&self) -> RectTransfer {
        RectTransfer::symmetric(self.origin, self.region, self.row_pitch, self.slice_pitch)
    }
}

/// Undo a previous map.
#[derive(Debug)]
pub struct UnmapCommand {
    pub mem: Arc<MemObject>,
    pub mapping: Arc<Mapping>,
}

/// An ND-range kernel launch.
#[derive(Debug)]
pub struct KernelLaunch {
    pub kernel: Arc<Kernel>,
    /// One entry per argument slot (explicit arguments then locals).
    pub arguments: Vec<KernelArg>,
    /// Buffers bound as arguments, held for the duration of the launch.
    pub arg_buffers: Vec<Option<Arc<MemObject>>>,
    /// Scratch directory of the compiled kernel binary.
    pub tmp_dir: Option<PathBuf>,
    pub work_dim: u32,
    pub global_offset: Rect3,
    pub global_size: Rect3,
    pub local_size: Rect3,
}

impl KernelLaunch {
    /// A launch with no arguments bound yet.
    pub fn new(kernel: Arc<Kernel>, global_size: Rect3, local_size: Rect3) -> Self {
        let work_dim = global_size.iter().rposition(|&n| n > 1).map_or(1, |i| i + 1) as u32;
        Self {
            kernel,
            arguments: Vec::new(),
            arg_buffers: Vec::new(),
            tmp_dir: None,
            work_dim,
            global_offset: [0; 3],
            global_size,
            local_size,
        }
    }
}

/// A host function executed as a command.
pub struct NativeKernel {
    pub func: NativeFn,
    /// Argument block passed to `func`.
    pub args: Box<[u8]>,
    /// Memory objects referenced from the argument block.
    pub mem_list: Vec<Option<Arc<MemObject>>>,
}

impl fmt::Debug for NativeKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeKernel")
            .field("args_len", &self.args.len())
            .field("mem_list", &self.mem_list)
            .finish_non_exhaustive()
    }
}

/// Fill an image region with one pixel value.
#[derive(Debug)]
pub struct ImageFill {
    pub image: Arc<MemObject>,
    pub device_ptr: DevicePtr,
    pub origin: Rect3,
    pub region: Rect3,
    pub row_pitch: usize,
    pub slice_pitch: usize,
    /// Pixel bytes; its length is the pixel size.
    pub fill_pixel: Box<[u8]>,
}

/// Fill a buffer range with a repeated pattern.
#[derive(Debug)]
pub struct BufferFill {
    pub buffer: Arc<MemObject>,
    pub device_ptr: DevicePtr,
    pub offset: usize,
    pub size: usize,
    pub pattern: Box<[u8]>,
}

/// Free SVM allocations.
pub struct SvmFree {
    pub pointers: Vec<SvmPtr>,
    /// Frees the pointers instead of the device when present.
    pub free_fn: Option<SvmFreeFn>,
}

impl fmt::Debug for SvmFree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvmFree")
            .field("pointers", &self.pointers)
            .field("free_fn", &self.free_fn.is_some())
            .finish()
    }
}

/// Map an SVM region for host access.
#[derive(Debug)]
pub struct SvmMap {
    pub svm_ptr: SvmPtr,
    pub size: usize,
}

/// Release host access to an SVM region.
#[derive(Debug)]
pub struct SvmUnmap {
    pub svm_ptr: SvmPtr,
}

/// Copy between SVM regions.
#[derive(Debug)]
pub struct SvmMemcpy {
    pub dst: SvmPtr,
    pub src: SvmPtr,
    pub size: usize,
}

/// Fill an SVM region with a repeated pattern.
#[derive(Debug)]
pub struct SvmMemFill {
    pub svm_ptr: SvmPtr,
    pub size: usize,
    pub pattern: Box<[u8]>,
}
