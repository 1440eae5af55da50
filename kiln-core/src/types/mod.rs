//! Core identifier and address types.

mod ids;
mod pointer;

pub use ids::{CommandId, DeviceId, EventId, KernelId, MemId, QueueId};
pub use pointer::{DevicePtr, HostPtr, Rect3, RectTransfer, SvmPtr};
