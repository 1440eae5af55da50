//! Prelude for convenient imports.
//!
//! ```ignore
//! use kiln_core::prelude::*;
//! ```

// Core types
pub use crate::types::{
    CommandId, DeviceId, DevicePtr, EventId, HostPtr, KernelId, MemId, QueueId, Rect3,
    RectTransfer, SvmPtr,
};

// Error handling
pub use crate::error::{KilnError, Result};
pub use crate::fatal::{FatalAction, FatalCondition};

// Commands and queues
pub use crate::command::{
    BufferCopy, BufferFill, BufferTransfer, Command, CommandNode, CommandType, ImageFill,
    ImageTransfer, KernelLaunch, MapCommand, NativeKernel, NodeAllocator, SvmFree, SvmMap,
    SvmMemFill, SvmMemcpy, SvmUnmap, SystemAllocator, UnmapCommand,
};
pub use crate::queue::{CommandQueue, QueueProperties};

// Events
pub use crate::event::{Event, EventOwnership, EventRef, EventStatus};

// Device model
pub use crate::backend::DeviceBackend;
pub use crate::device::{Device, DeviceCapabilities};
pub use crate::kernel::{Kernel, KernelArg};
pub use crate::memory::{Mapping, MemFlags, MemObject};

// Logging
pub use crate::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent, LogLevel};
