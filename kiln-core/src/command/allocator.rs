//! Command node storage reclamation.

use crate::device::Device;
use crate::event::EventRef;
use crate::types::{CommandId, QueueId};
use std::sync::Arc;

/// What remains of a node once its payload and event are gone.
#[derive(Debug)]
pub struct NodeStorage {
    pub id: CommandId,
    pub queue_id: Option<QueueId>,
    pub device: Arc<Device>,
    pub wait_list: Vec<EventRef>,
}

/// Pool that node storage is returned to after execution.
///
/// The enqueue layer allocates nodes; the drain engine hands each one back
/// exactly once, after its callbacks have run.
pub trait NodeAllocator: Send + Sync {
    /// Take back the storage of a finished node.
    fn free(&self, storage: NodeStorage);
}

/// Allocator that simply drops node storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl NodeAllocator for SystemAllocator {
    fn free(&self, storage: NodeStorage) {
        drop(storage);
    }
}
