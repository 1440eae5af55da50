//! Common test utilities for integration tests.

#![allow(dead_code)]

use kiln_core::command::{BufferTransfer, Command, CommandNode, CommandType};
use kiln_core::device::Device;
use kiln_core::event::{Event, EventOwnership, EventStatus};
use kiln_core::fatal::FatalAction;
use kiln_core::logging::BufferedCollector;
use kiln_core::memory::MemObject;
use kiln_core::queue::CommandQueue;
use kiln_core::types::HostPtr;
use kiln_executor::{CursorPolicy, Executor, ExecutorConfig};
use parking_lot::Mutex;
use std::sync::Arc;

/// Executor config that panics on fatal conditions so tests can observe them.
pub fn test_executor_config() -> ExecutorConfig {
    ExecutorConfig::default()
        .with_fatal_action(FatalAction::Panic)
        .with_log_capacity(1024)
}

pub fn test_executor() -> Executor {
    Executor::new(test_executor_config()).unwrap()
}

pub fn test_executor_with_policy(policy: CursorPolicy) -> Executor {
    Executor::new(test_executor_config().with_cursor_policy(policy)).unwrap()
}

/// Executor whose command log can be queried.
pub fn logged_executor() -> (Executor, Arc<BufferedCollector>) {
    let log = Arc::new(BufferedCollector::new(1024));
    let exec = test_executor().with_collector(Arc::clone(&log) as _);
    (exec, log)
}

/// Enqueue `command` on `queue` with a fresh event of the given ownership.
pub fn enqueue(
    queue: &Arc<CommandQueue>,
    command: Command,
    ownership: EventOwnership,
) -> Arc<Event> {
    enqueue_waiting(queue, command, ownership, &[])
}

/// Enqueue `command` depending on `waits`.
pub fn enqueue_waiting(
    queue: &Arc<CommandQueue>,
    command: Command,
    ownership: EventOwnership,
    waits: &[&Arc<Event>],
) -> Arc<Event> {
    let event = Event::new(queue, command.command_type(), ownership);
    let node = CommandNode::new(Arc::clone(queue.device()), command)
        .with_event(Arc::clone(&event))
        .with_wait_list(waits.iter().copied());
    queue.enqueue(node);
    event
}

/// Enqueue a marker with a user-owned event.
pub fn enqueue_marker(queue: &Arc<CommandQueue>) -> Arc<Event> {
    enqueue(queue, Command::Marker, EventOwnership::User)
}

/// A buffer write from `host` into `buffer` on `device`.
pub fn write_buffer(device: &Device, buffer: &Arc<MemObject>, host: usize) -> Command {
    Command::WriteBuffer(BufferTransfer {
        buffer: Arc::clone(buffer),
        host_ptr: HostPtr::new(host),
        device_ptr: buffer.device_ptr(device),
        offset: 0,
        size: buffer.size(),
    })
}

/// A buffer read from `buffer` on `device` into `host`.
pub fn read_buffer(device: &Device, buffer: &Arc<MemObject>, host: usize) -> Command {
    Command::ReadBuffer(BufferTransfer {
        buffer: Arc::clone(buffer),
        host_ptr: HostPtr::new(host),
        device_ptr: buffer.device_ptr(device),
        offset: 0,
        size: buffer.size(),
    })
}

/// Records `(tag, status)` pairs from event callbacks.
#[derive(Clone, Default)]
pub struct CallbackLog {
    entries: Arc<Mutex<Vec<(&'static str, EventStatus)>>>,
}

impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `Complete` callback on `event` that records `tag`.
    pub fn register(&self, event: &Event, tag: &'static str) {
        let entries = Arc::clone(&self.entries);
        event.add_callback(EventStatus::Complete, move |_, status| {
            entries.lock().push((tag, status));
        });
    }

    pub fn entries(&self) -> Vec<(&'static str, EventStatus)> {
        self.entries.lock().clone()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.entries.lock().iter().map(|(tag, _)| *tag).collect()
    }
}

/// A detached event with the given kind, for wait-lists.
pub fn detached_event(kind: CommandType) -> Arc<Event> {
    Event::detached(kind, EventOwnership::User)
}
