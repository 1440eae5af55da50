//! Ready batches.

use kiln_core::command::CommandNode;
use kiln_core::event::Event;
use kiln_core::fatal::ABANDONED_EVENT_CODE;
use kiln_core::types::CommandId;

/// Commands whose dependencies were satisfied, in admission order.
///
/// A batch is no longer linked into any queue, so it can be dispatched
/// without holding queue locks. Commands extracted because one of their
/// dependencies failed ride along as `cancelled`: their events are already
/// `Failed` and they are finalized without being executed.
#[derive(Debug, Default)]
pub struct ReadyBatch {
    nodes: Vec<CommandNode>,
    cancelled: Vec<CommandNode>,
}

impl ReadyBatch {
    pub(crate) fn push(&mut self, node: CommandNode) {
        self.nodes.push(node);
    }

    pub(crate) fn push_cancelled(&mut self, node: CommandNode) {
        self.cancelled.push(node);
    }

    /// Number of commands to execute.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when there is nothing to execute or finalize.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.cancelled.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandNode> {
        self.nodes.iter()
    }

    pub fn cancelled(&self) -> &[CommandNode] {
        &self.cancelled
    }

    /// Command ids in admission order.
    pub fn command_ids(&self) -> Vec<CommandId> {
        self.nodes.iter().map(CommandNode::id).collect()
    }

    pub(crate) fn into_parts(self) -> (Vec<CommandNode>, Vec<CommandNode>) {
        (self.nodes, self.cancelled)
    }

    /// Fail the event of every command that will now never run.
    pub(crate) fn abandon(&mut self) -> usize {
        let nodes = std::mem::take(&mut self.nodes);
        abandon_events(nodes.iter().filter_map(CommandNode::event).map(|event| &**event))
    }
}

/// Move each non-terminal event to `Failed`. Returns how many moved.
pub(crate) fn abandon_events<'e>(events: impl IntoIterator<Item = &'e Event>) -> usize {
    let mut failed = 0;
    for event in events {
        if event.fail(ABANDONED_EVENT_CODE).is_ok() {
            tracing::debug!(event_id = %event.id(), "Event abandoned");
            failed += 1;
        }
    }
    failed
}

impl<'a> IntoIterator for &'a ReadyBatch {
    type Item = &'a CommandNode;
    type IntoIter = std::slice::Iter<'a, CommandNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
