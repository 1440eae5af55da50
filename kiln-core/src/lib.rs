//! Kiln Core Library
//!
//! The data model shared by the kiln command engine: command queues and the
//! nodes enqueued on them, completion events, devices with their backend
//! contract, and the memory objects and kernels commands operate on.
//!
//! # Key Components
//!
//! - **Queue**: ordered pending lists of [`CommandNode`]s
//! - **Event**: per-command status, callbacks and profiling
//! - **Backend**: the [`DeviceBackend`] trait device drivers implement
//! - **Logging**: a structured, queryable command log
//! - **Testing**: a recording backend and allocator for tests
//!
//! The drain engine itself lives in `kiln-executor`.

#![warn(clippy::all)]

pub mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod event;
pub mod fatal;
pub mod kernel;
pub mod logging;
pub mod memory;
pub mod prelude;
pub mod queue;
pub mod testing;
pub mod types;

pub use backend::DeviceBackend;
pub use command::{Command, CommandNode, CommandType};
pub use device::{Device, DeviceCapabilities};
pub use error::{KilnError, Result};
pub use event::{Event, EventOwnership, EventRef, EventStatus};
pub use fatal::{FatalAction, FatalCondition, raise_fatal};
pub use queue::{CommandQueue, QueueProperties};
pub use types::{CommandId, EventId, QueueId};
