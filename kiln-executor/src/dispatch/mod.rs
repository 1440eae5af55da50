//! Command dispatch.
//!
//! The dispatcher consumes a [`ReadyBatch`] and runs each command to
//! completion, in batch order:
//!
//! 1. the device's compile hook
//! 2. event `Running`
//! 3. the backend operation for the command kind
//! 4. event `Complete`
//! 5. payload release
//! 6. event callbacks, then release of an implicit event
//! 7. node storage returned to the allocator
//!
//! Backend calls are synchronous: when one returns, the device work is done.
//! A fatal condition stops the batch where it stands; later commands are
//! never executed. When that fatal condition unwinds instead of aborting,
//! the interrupted command's event and those of every command after it are
//! failed on the way out.
//!
//! Cancelled commands (a dependency failed) skip steps 1 to 4: their events
//! are already `Failed`, and they are only finalized.

mod release;

pub use release::{ReleaseSummary, release_command};

use crate::resolver::{ReadyBatch, abandon_events};
use kiln_core::command::{Command, CommandNode, NodeAllocator, UnmapCommand};
use kiln_core::device::Device;
use kiln_core::error::Result;
use kiln_core::event::Event;
use kiln_core::fatal::{FatalAction, FatalCondition, raise_fatal};
use kiln_core::logging::{LogCategory, LogCollector, LogEvent};
use kiln_core::types::{CommandId, DevicePtr};
use std::sync::{Arc, Weak};
use std::vec;

/// Result of dispatching a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Commands run to completion.
    pub executed: usize,
    /// Commands finalized without running because a dependency failed.
    pub cancelled: usize,
    /// Resources released across the batch.
    pub released: ReleaseSummary,
}

/// Runs ready batches against their devices.
pub struct Dispatcher<'a> {
    allocator: &'a dyn NodeAllocator,
    log: &'a dyn LogCollector,
    fatal_action: FatalAction,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        allocator: &'a dyn NodeAllocator,
        log: &'a dyn LogCollector,
        fatal_action: FatalAction,
    ) -> Self {
        Self {
            allocator,
            log,
            fatal_action,
        }
    }

    /// Execute and finalize every command in `batch`.
    pub fn dispatch(&self, batch: ReadyBatch) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let (ready, cancelled) = batch.into_parts();

        for node in cancelled {
            summary.released += self.finalize(node, "Command finalized");
            summary.cancelled += 1;
        }

        let mut guard = UnwindGuard {
            current: None,
            rest: ready.into_iter(),
        };
        while let Some(node) = guard.rest.next() {
            guard.current = node.event().map(Arc::downgrade);
            summary.released += self.execute(node);
            guard.current = None;
            summary.executed += 1;
        }
        summary
    }

    /// Execute and finalize one command.
    pub fn execute(&self, node: CommandNode) -> ReleaseSummary {
        let command_id = node.id();
        let command_type = node.command_type();

        node.device().backend().compile_submitted_kernels(&node);

        if let Some(event) = node.event() {
            advance(event, command_id, Event::start);
        }
        tracing::debug!(
            command_id = %command_id,
            command_type = %command_type,
            device = node.device().name(),
            "Dispatching command"
        );

        self.run_command(&node);

        if let Some(event) = node.event() {
            advance(event, command_id, Event::complete);
        }

        self.finalize(node, "Command complete")
    }

    /// Release payload, deliver callbacks and free storage.
    fn finalize(&self, node: CommandNode, message: &'static str) -> ReleaseSummary {
        let command_id = node.id();
        let queue_id = node.queue_id();
        let command_type = node.command_type();
        let event_id = node.event().map(|e| e.id());

        let parts = node.into_parts();
        let released = release_command(parts.command);

        let mut entry = LogEvent::debug(LogCategory::Command, message)
            .with_command_id(command_id)
            .with_event_id(event_id)
            .with_field("command_type", command_type.as_str())
            .with_field("mem_objects_released", released.mem_objects)
            .with_field("kernels_released", released.kernels);
        if let Some(queue_id) = queue_id {
            entry = entry.with_queue_id(queue_id);
        }
        self.log.collect(entry);

        if let Some(event) = parts.event {
            let fired = event.fire_callbacks();
            tracing::trace!(event_id = %event.id(), fired, "Callbacks delivered");
            if event.is_implicit() {
                event.release();
            }
        }

        self.allocator.free(parts.storage);
        released
    }

    fn run_command(&self, node: &CommandNode) {
        let device = node.device();
        let backend = device.backend();

        match node.command() {
            Command::ReadBuffer(read) => {
                backend.read(read.host_ptr, read.device_ptr, read.offset, read.size);
            }
            Command::WriteBuffer(write) => {
                backend.write(write.host_ptr, write.device_ptr, write.offset, write.size);
            }
            Command::CopyBuffer(copy) => backend.copy(
                copy.src_ptr,
                copy.src_offset,
                copy.dst_ptr,
                copy.dst_offset,
                copy.size,
            ),
            Command::Map(map) => backend.map_mem(
                map.device_ptr,
                map.mapping.offset,
                map.mapping.size,
                map.mapping.host_ptr,
            ),
            Command::ReadImage(image) => {
                backend.read_rect(image.host_ptr, image.device_ptr, &image.rect());
            }
            Command::WriteImage(image) => {
                backend.write_rect(image.host_ptr, image.device_ptr, &image.rect());
            }
            Command::Unmap(unmap) => self.unmap(node.id(), device, unmap),
            Command::NdRangeKernel(launch) => backend.run(launch),
            Command::NativeKernel(native) => backend.run_native(native),
            Command::FillImage(fill) => backend.fill_rect(
                fill.device_ptr,
                fill.origin,
                fill.region,
                fill.row_pitch,
                fill.slice_pitch,
                &fill.fill_pixel,
            ),
            Command::FillBuffer(fill) => {
                backend.memfill(fill.device_ptr, fill.size, fill.offset, &fill.pattern);
            }
            Command::Marker => {}
            Command::SvmFree(free) => match &free.free_fn {
                Some(free_fn) => {
                    free_fn(node.queue_id(), &free.pointers);
                }
                None => {
                    for &ptr in &free.pointers {
                        backend.free_ptr(ptr);
                    }
                }
            },
            Command::SvmMap(_) => {
                if !device.mmap_is_nop() {
                    self.fatal(
                        node,
                        FatalCondition::SvmMapUnsupported {
                            command_id: node.id(),
                        },
                    );
                }
            }
            Command::SvmUnmap(_) => {
                if !device.mmap_is_nop() {
                    self.fatal(
                        node,
                        FatalCondition::SvmUnmapUnsupported {
                            command_id: node.id(),
                        },
                    );
                }
            }
            Command::SvmMemcpy(memcpy) => backend.copy(
                DevicePtr::new(memcpy.src.addr()),
                0,
                DevicePtr::new(memcpy.dst.addr()),
                0,
                memcpy.size,
            ),
            Command::SvmMemFill(fill) => backend.memfill(
                DevicePtr::new(fill.svm_ptr.addr()),
                fill.size,
                0,
                &fill.pattern,
            ),
            Command::Unsupported(command_type) => self.fatal(
                node,
                FatalCondition::UnsupportedCommand {
                    command_id: node.id(),
                    command_type: *command_type,
                },
            ),
        }
    }

    fn unmap(
        &self,
        command_id: CommandId,
        device: &Arc<Device>,
        unmap: &UnmapCommand,
    ) {
        let mem = &unmap.mem;
        if mem.is_host_coherent() {
            tracing::trace!(mem_id = %mem.id(), "Host-coherent unmap, skipping device");
        } else {
            device.backend().unmap_mem(
                unmap.mapping.host_ptr,
                mem.device_ptr(device),
                unmap.mapping.size,
            );
        }

        if let Err(err) = mem.remove_mapping(&unmap.mapping) {
            tracing::warn!(command_id = %command_id, error = %err, "Unmap of unknown mapping");
            self.log.collect(
                LogEvent::warn(LogCategory::Memory, "Unmap of unknown mapping")
                    .with_command_id(command_id)
                    .with_field("error_code", err.code()),
            );
        }
    }

    fn fatal(&self, node: &CommandNode, condition: FatalCondition) -> ! {
        let mut entry = LogEvent::error(LogCategory::System, condition.to_string())
            .with_command_id(node.id())
            .with_event_id(node.event().map(|e| e.id()))
            .with_field("fatal", condition.kind());
        if let Some(queue_id) = node.queue_id() {
            entry = entry.with_queue_id(queue_id);
        }
        self.log.collect(entry);
        raise_fatal(condition, self.fatal_action)
    }
}

/// Fails the in-flight and remaining events if dispatch unwinds.
struct UnwindGuard {
    current: Option<Weak<Event>>,
    rest: vec::IntoIter<CommandNode>,
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let current = self.current.take().and_then(|event| event.upgrade());
        let rest: Vec<CommandNode> = self.rest.by_ref().collect();
        let failed = abandon_events(
            current
                .as_deref()
                .into_iter()
                .chain(rest.iter().filter_map(|node| node.event().map(|e| &**e))),
        );
        tracing::warn!(failed, "Dispatch unwound, unexecuted events failed");
    }
}

/// Apply a success-path transition, logging if the event had moved on.
fn advance(event: &Event, command_id: CommandId, step: fn(&Event) -> Result<()>) {
    if let Err(err) = step(event) {
        tracing::warn!(command_id = %command_id, error = %err, "Event transition rejected");
    }
}
