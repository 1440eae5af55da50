//! Command nodes.

use super::{Command, CommandType, NodeStorage};
use crate::device::Device;
use crate::event::{Event, EventRef};
use crate::types::{CommandId, QueueId};
use std::sync::Arc;

/// One enqueued command.
#[derive(Debug)]
pub struct CommandNode {
    id: CommandId,
    device: Arc<Device>,
    /// Set when the node is enqueued.
    queue_id: Option<QueueId>,
    event: Option<Arc<Event>>,
    wait_list: Vec<EventRef>,
    command: Command,
}

/// A node split for finalization.
#[derive(Debug)]
pub struct NodeParts {
    /// Storage returned to the allocator.
    pub storage: NodeStorage,
    /// The owning event, if any.
    pub event: Option<Arc<Event>>,
    /// The payload, released after dispatch.
    pub command: Command,
}

impl CommandNode {
    /// Create a node with no event and an empty wait-list.
    pub fn new(device: Arc<Device>, command: Command) -> Self {
        Self {
            id: CommandId::next(),
            device,
            queue_id: None,
            event: None,
            wait_list: Vec::new(),
            command,
        }
    }

    /// Attach the owning event.
    pub fn with_event(mut self, event: Arc<Event>) -> Self {
        self.event = Some(event);
        self
    }

    /// Depend on every event in `events`.
    pub fn with_wait_list<'a>(mut self, events: impl IntoIterator<Item = &'a Arc<Event>>) -> Self {
        self.wait_list.extend(events.into_iter().map(EventRef::new));
        self
    }

    /// Depend on `event`.
    pub fn wait_on(mut self, event: &Arc<Event>) -> Self {
        self.wait_list.push(EventRef::new(event));
        self
    }

    pub(crate) fn bind_queue(&mut self, queue_id: QueueId) {
        self.queue_id = Some(queue_id);
    }

    /// Node identifier.
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Target device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Queue the node was enqueued on.
    pub fn queue_id(&self) -> Option<QueueId> {
        self.queue_id
    }

    /// Owning event.
    pub fn event(&self) -> Option<&Arc<Event>> {
        self.event.as_ref()
    }

    /// Events this node depends on.
    pub fn wait_list(&self) -> &[EventRef] {
        &self.wait_list
    }

    /// The payload.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Kind of the payload.
    pub fn command_type(&self) -> CommandType {
        self.command.command_type()
    }

    /// Split the node into storage, event and payload.
    pub fn into_parts(self) -> NodeParts {
        NodeParts {
            storage: NodeStorage {
                id: self.id,
                queue_id: self.queue_id,
                device: self.device,
                wait_list: self.wait_list,
            },
            event: self.event,
            command: self.command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventOwnership;
    use crate::testing::test_device;

    #[test]
    fn builder_collects_wait_list() {
        let a = Event::detached(CommandType::Marker, EventOwnership::User);
        let b = Event::detached(CommandType::Marker, EventOwnership::User);
        let own = Event::detached(CommandType::Marker, EventOwnership::Implicit);

        let node = CommandNode::new(test_device(), Command::Marker)
            .with_event(Arc::clone(&own))
            .with_wait_list([&a])
            .wait_on(&b);

        let ids: Vec<_> = node.wait_list().iter().map(EventRef::id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
        assert_eq!(node.event().map(|e| e.id()), Some(own.id()));
        assert_eq!(node.command_type(), CommandType::Marker);
        assert!(node.queue_id().is_none());

        // Wait-list entries do not own their events.
        assert_eq!(Arc::strong_count(&a), 1);
    }

    #[test]
    fn into_parts_keeps_identity() {
        let node = CommandNode::new(test_device(), Command::Marker);
        let id = node.id();
        let parts = node.into_parts();
        assert_eq!(parts.storage.id, id);
        assert!(parts.event.is_none());
        assert!(matches!(parts.command, Command::Marker));
    }
}
