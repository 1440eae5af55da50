//! Payload release.
//!
//! Everything a command owned for its execution is dropped here, once, after
//! its event completes and before its callbacks run.

use kiln_core::command::Command;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// What finalizing one or more commands gave back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    /// Memory object references dropped.
    pub mem_objects: usize,
    /// Kernel references dropped.
    pub kernels: usize,
    /// Owned heap payload bytes freed (argument blocks, patterns, pixels).
    pub heap_bytes: usize,
}

impl ReleaseSummary {
    /// Count what `command` owns without dropping it.
    pub fn of(command: &Command) -> Self {
        match command {
            Command::ReadBuffer(_)
            | Command::WriteBuffer(_)
            | Command::Map(_)
            | Command::ReadImage(_)
            | Command::WriteImage(_)
            | Command::Unmap(_) => Self::mem(1),
            Command::CopyBuffer(_) => Self::mem(2),
            Command::NdRangeKernel(launch) => Self {
                mem_objects: launch.arg_buffers.iter().flatten().count(),
                kernels: 1,
                heap_bytes: launch
                    .arguments
                    .iter()
                    .map(|arg| arg.heap_bytes())
                    .sum::<usize>()
                    + launch
                        .tmp_dir
                        .as_ref()
                        .map_or(0, |dir| dir.as_os_str().len()),
            },
            Command::NativeKernel(native) => Self {
                mem_objects: native.mem_list.iter().flatten().count(),
                kernels: 0,
                heap_bytes: native.args.len(),
            },
            Command::FillImage(fill) => Self {
                heap_bytes: fill.fill_pixel.len(),
                ..Self::mem(1)
            },
            Command::FillBuffer(fill) => Self {
                heap_bytes: fill.pattern.len(),
                ..Self::mem(1)
            },
            Command::SvmMemFill(fill) => Self {
                heap_bytes: fill.pattern.len(),
                ..Self::default()
            },
            Command::Marker
            | Command::SvmFree(_)
            | Command::SvmMap(_)
            | Command::SvmUnmap(_)
            | Command::SvmMemcpy(_)
            | Command::Unsupported(_) => Self::default(),
        }
    }

    fn mem(count: usize) -> Self {
        Self {
            mem_objects: count,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for ReleaseSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.mem_objects += rhs.mem_objects;
        self.kernels += rhs.kernels;
        self.heap_bytes += rhs.heap_bytes;
    }
}

/// Drop `command` and everything it owns.
pub fn release_command(command: Command) -> ReleaseSummary {
    let summary = ReleaseSummary::of(&command);
    drop(command);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::command::{BufferCopy, BufferFill, KernelLaunch};
    use kiln_core::kernel::{Kernel, KernelArg};
    use kiln_core::memory::MemFlags;
    use kiln_core::testing::test_buffer;
    use kiln_core::types::DevicePtr;
    use std::sync::Arc;

    #[test]
    fn copy_releases_both_buffers() {
        let src = test_buffer(MemFlags::READ_ONLY, 64);
        let dst = test_buffer(MemFlags::WRITE_ONLY, 64);
        let cmd = Command::CopyBuffer(BufferCopy {
            src_buffer: Arc::clone(&src),
            dst_buffer: Arc::clone(&dst),
            src_ptr: DevicePtr::new(0x100),
            src_offset: 0,
            dst_ptr: DevicePtr::new(0x200),
            dst_offset: 0,
            size: 64,
        });
        assert_eq!(Arc::strong_count(&src), 2);

        let summary = release_command(cmd);
        assert_eq!(summary.mem_objects, 2);
        assert_eq!(Arc::strong_count(&src), 1);
        assert_eq!(Arc::strong_count(&dst), 1);
    }

    #[test]
    fn kernel_launch_counts_args_and_buffers() {
        let kernel = Arc::new(Kernel::new("saxpy", 2, 1));
        let buf = test_buffer(MemFlags::READ_WRITE, 256);
        let mut launch = KernelLaunch::new(Arc::clone(&kernel), [256, 1, 1], [64, 1, 1]);
        launch.arguments = vec![
            KernelArg::value(vec![0u8; 8]),
            KernelArg::value(vec![0u8; 4]),
            KernelArg::local(128),
        ];
        launch.arg_buffers = vec![Some(Arc::clone(&buf)), None, None];

        let summary = release_command(Command::NdRangeKernel(launch));
        assert_eq!(summary.kernels, 1);
        assert_eq!(summary.mem_objects, 1);
        assert_eq!(summary.heap_bytes, 12);
        assert_eq!(Arc::strong_count(&kernel), 1);
        assert_eq!(Arc::strong_count(&buf), 1);
    }

    #[test]
    fn summaries_accumulate() {
        let buf = test_buffer(MemFlags::READ_WRITE, 16);
        let mut total = ReleaseSummary::default();
        assert!(total.is_empty());
        total += release_command(Command::FillBuffer(BufferFill {
            buffer: buf,
            device_ptr: DevicePtr::new(0x10),
            offset: 0,
            size: 16,
            pattern: vec![1, 2, 3, 4].into_boxed_slice(),
        }));
        total += release_command(Command::Marker);
        assert_eq!(
            total,
            ReleaseSummary {
                mem_objects: 1,
                kernels: 0,
                heap_bytes: 4
            }
        );
    }
}
