//! Command queues.
//!
//! A queue holds the pending commands enqueued on it, in enqueue order. The
//! drain engine removes commands from the front; nothing else removes them.

use crate::command::CommandNode;
use crate::device::Device;
use crate::types::QueueId;
use bitflags::bitflags;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Properties a queue was created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct QueueProperties: u32 {
        const OUT_OF_ORDER_EXEC_MODE_ENABLE = 1 << 0;
        const PROFILING_ENABLE = 1 << 1;
    }
}

/// An ordered queue of pending commands bound to one device.
pub struct CommandQueue {
    id: QueueId,
    device: Arc<Device>,
    properties: QueueProperties,
    pending: Mutex<VecDeque<CommandNode>>,
}

impl CommandQueue {
    /// Create an empty queue on `device`.
    pub fn new(device: Arc<Device>, properties: QueueProperties) -> Arc<Self> {
        Arc::new(Self {
            id: QueueId::next(),
            device,
            properties,
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn properties(&self) -> QueueProperties {
        self.properties
    }

    /// Whether events on this queue record transition timestamps.
    pub fn profiling_enabled(&self) -> bool {
        self.properties.contains(QueueProperties::PROFILING_ENABLE)
    }

    pub fn is_out_of_order(&self) -> bool {
        self.properties
            .contains(QueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE)
    }

    /// Append a command to the back of the queue.
    pub fn enqueue(&self, mut node: CommandNode) {
        node.bind_queue(self.id);
        tracing::trace!(
            queue_id = %self.id,
            command_id = %node.id(),
            command_type = %node.command_type(),
            "Command enqueued"
        );
        self.pending.lock().push_back(node);
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Lock the pending list.
    ///
    /// Holders must not lock another queue's pending list while holding this
    /// guard, except through the drain engine's resolution protocol.
    pub fn lock_pending(&self) -> MutexGuard<'_, VecDeque<CommandNode>> {
        self.pending.lock()
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("id", &self.id)
            .field("device", &self.device.name())
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::testing::test_device;

    #[test]
    fn enqueue_preserves_order_and_binds_queue() {
        let device = test_device();
        let queue = CommandQueue::new(Arc::clone(&device), QueueProperties::empty());
        assert!(queue.is_empty());

        let first = CommandNode::new(Arc::clone(&device), Command::Marker);
        let second = CommandNode::new(Arc::clone(&device), Command::Marker);
        let ids = [first.id(), second.id()];
        queue.enqueue(first);
        queue.enqueue(second);

        assert_eq!(queue.len(), 2);
        let pending = queue.lock_pending();
        let seen: Vec<_> = pending.iter().map(CommandNode::id).collect();
        assert_eq!(seen, ids);
        assert!(pending.iter().all(|n| n.queue_id() == Some(queue.id())));
    }

    #[test]
    fn properties() {
        let device = test_device();
        let plain = CommandQueue::new(Arc::clone(&device), QueueProperties::empty());
        assert!(!plain.is_out_of_order());
        assert!(!plain.profiling_enabled());

        let ooo = CommandQueue::new(
            device,
            QueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE | QueueProperties::PROFILING_ENABLE,
        );
        assert!(ooo.is_out_of_order());
        assert!(ooo.profiling_enabled());
    }
}
