//! Device backend contract.
//!
//! A backend is the device-specific half of command execution. The drain
//! engine decides *when* a command runs and finalizes it afterwards; the
//! backend decides *how* the bytes move or the kernel runs.
//!
//! # Implementation Notes
//!
//! - Every method is synchronous from the engine's point of view: when it
//!   returns, the device work is done. The engine marks the command's event
//!   complete immediately afterwards, so any asynchrony must be hidden inside
//!   the backend.
//! - Methods report no recoverable errors to the engine. Device faults belong
//!   in the event error state ([`crate::event::EventStatus::Failed`]), which
//!   the engine itself never sets on the success path.
//! - Addresses are opaque values produced by the same backend (or by the
//!   host for [`HostPtr`]); the engine forwards them untouched.

use crate::command::{CommandNode, KernelLaunch, NativeKernel};
use crate::types::{DevicePtr, HostPtr, Rect3, RectTransfer, SvmPtr};

/// Operations a device exposes to the drain engine.
pub trait DeviceBackend: Send + Sync {
    /// Copy `size` bytes at `offset` of a device buffer into host memory.
    fn read(&self, host_ptr: HostPtr, device_ptr: DevicePtr, offset: usize, size: usize);

    /// Copy `size` bytes from host memory into a device buffer at `offset`.
    fn write(&self, host_ptr: HostPtr, device_ptr: DevicePtr, offset: usize, size: usize);

    /// Copy between two device allocations.
    fn copy(
        &self,
        src_ptr: DevicePtr,
        src_offset: usize,
        dst_ptr: DevicePtr,
        dst_offset: usize,
        size: usize,
    );

    /// Rectangular device-to-host copy.
    fn read_rect(&self, host_ptr: HostPtr, device_ptr: DevicePtr, transfer: &RectTransfer);

    /// Rectangular host-to-device copy.
    fn write_rect(&self, host_ptr: HostPtr, device_ptr: DevicePtr, transfer: &RectTransfer);

    /// Run an ND-range kernel launch.
    fn run(&self, launch: &KernelLaunch);

    /// Run a host function as a native kernel.
    fn run_native(&self, native: &NativeKernel);

    /// Fill a rectangular image region with a single pixel value.
    #[allow(clippy::too_many_arguments)]
    fn fill_rect(
        &self,
        device_ptr: DevicePtr,
        origin: Rect3,
        region: Rect3,
        row_pitch: usize,
        slice_pitch: usize,
        pixel: &[u8],
    );

    /// Fill `size` bytes starting at `offset` with a repeated pattern.
    fn memfill(&self, device_ptr: DevicePtr, size: usize, offset: usize, pattern: &[u8]);

    /// Make `size` bytes at `offset` of a device allocation visible at `host_ptr`.
    fn map_mem(&self, device_ptr: DevicePtr, offset: usize, size: usize, host_ptr: HostPtr);

    /// Write a mapped host region back to its device allocation.
    ///
    /// Devices whose mappings are always coherent need not implement this.
    fn unmap_mem(&self, _host_ptr: HostPtr, _device_ptr: DevicePtr, _size: usize) {}

    /// Free a shared virtual memory allocation.
    fn free_ptr(&self, ptr: SvmPtr);

    /// Finish compilation of kernels that were submitted lazily.
    ///
    /// Called once per command, before dispatch. Devices that compile eagerly
    /// need not implement this.
    fn compile_submitted_kernels(&self, _node: &CommandNode) {}
}
