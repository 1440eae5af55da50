//! Completion events.
//!
//! Every command may own an [`Event`]. The event moves through
//! `Queued -> Submitted -> Running -> Complete` as the drain engine admits,
//! dispatches and finishes the command; `Failed` is a terminal state reserved
//! for collaborators that detect device faults.
//!
//! Other commands observe an event through an [`EventRef`] in their wait-list.
//! An `EventRef` is weak: it never keeps the event alive and is never released
//! by the reader.

use crate::command::CommandType;
use crate::error::{KilnError, Result};
use crate::queue::CommandQueue;
use crate::types::{EventId, QueueId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Execution status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Enqueued, not yet admitted for execution.
    Queued,
    /// Admitted to a ready batch.
    Submitted,
    /// Dispatched to the device.
    Running,
    /// Finished successfully.
    Complete,
    /// Terminated with a device error code.
    Failed(i32),
}

impl EventStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Submitted => 1,
            Self::Running => 2,
            Self::Complete | Self::Failed(_) => 3,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }

    /// Whether a command waiting on an event in this status may be admitted.
    ///
    /// Only `Submitted` and `Complete` qualify. A `Running` event belongs to
    /// a batch being dispatched by another drain and still blocks.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Submitted | Self::Complete)
    }

    /// Whether this status is at or beyond `trigger`.
    pub fn has_reached(&self, trigger: EventStatus) -> bool {
        self.is_terminal() || self.rank() >= trigger.rank()
    }

    /// Lowercase name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(code) => write!(f, "failed({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Who owns the event's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOwnership {
    /// Created by the runtime for its own bookkeeping; released by the engine
    /// once the owning command's callbacks have run.
    Implicit,
    /// Handed out to the user, who releases it.
    User,
}

/// Timestamps of each transition, recorded on profiling-enabled queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilingInfo {
    /// When the event was created.
    pub queued: Option<Instant>,
    /// When the command was admitted to a ready batch.
    pub submit: Option<Instant>,
    /// When dispatch started.
    pub start: Option<Instant>,
    /// When dispatch finished.
    pub end: Option<Instant>,
}

/// Callback signature: the event and the trigger status it was registered for.
pub type CallbackFn = Arc<dyn Fn(&Event, EventStatus) + Send + Sync>;

struct EventCallback {
    trigger: EventStatus,
    func: CallbackFn,
}

struct EventState {
    status: EventStatus,
    profiling: ProfilingInfo,
}

/// A command completion token.
pub struct Event {
    id: EventId,
    queue_id: QueueId,
    queue: Weak<CommandQueue>,
    command_type: CommandType,
    ownership: EventOwnership,
    profiling_enabled: bool,
    state: Mutex<EventState>,
    /// Registered callbacks, in registration order.
    callbacks: Mutex<Vec<EventCallback>>,
    callbacks_fired: AtomicBool,
    released: AtomicBool,
}

impl Event {
    /// Create an event for a command enqueued on `queue`.
    pub fn new(
        queue: &Arc<CommandQueue>,
        command_type: CommandType,
        ownership: EventOwnership,
    ) -> Arc<Self> {
        Arc::new(Self::build(
            queue.id(),
            Arc::downgrade(queue),
            command_type,
            ownership,
            queue.profiling_enabled(),
        ))
    }

    /// Create an event that is not bound to any live queue.
    ///
    /// A drain blocked on a detached event cannot follow it anywhere.
    pub fn detached(command_type: CommandType, ownership: EventOwnership) -> Arc<Self> {
        Arc::new(Self::build(
            QueueId::from_raw(0),
            Weak::new(),
            command_type,
            ownership,
            false,
        ))
    }

    fn build(
        queue_id: QueueId,
        queue: Weak<CommandQueue>,
        command_type: CommandType,
        ownership: EventOwnership,
        profiling_enabled: bool,
    ) -> Self {
        let profiling = ProfilingInfo {
            queued: profiling_enabled.then(Instant::now),
            ..ProfilingInfo::default()
        };
        Self {
            id: EventId::next(),
            queue_id,
            queue,
            command_type,
            ownership,
            profiling_enabled,
            state: Mutex::new(EventState {
                status: EventStatus::Queued,
                profiling,
            }),
            callbacks: Mutex::new(Vec::new()),
            callbacks_fired: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    /// Event identifier.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Identifier of the queue the owning command was enqueued on.
    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    /// The owning queue, if it is still alive.
    pub fn queue(&self) -> Option<Arc<CommandQueue>> {
        self.queue.upgrade()
    }

    /// Kind of the owning command.
    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    /// Ownership of this event.
    pub fn ownership(&self) -> EventOwnership {
        self.ownership
    }

    /// Whether the runtime owns this event's lifetime.
    pub fn is_implicit(&self) -> bool {
        self.ownership == EventOwnership::Implicit
    }

    /// Current status.
    pub fn status(&self) -> EventStatus {
        self.state.lock().status
    }

    /// Transition timestamps; all `None` unless the queue profiles.
    pub fn profiling(&self) -> ProfilingInfo {
        self.state.lock().profiling
    }

    /// Move to `Submitted`.
    pub fn submit(&self) -> Result<()> {
        self.transition(EventStatus::Submitted)
    }

    /// Move to `Running`.
    pub fn start(&self) -> Result<()> {
        self.transition(EventStatus::Running)
    }

    /// Move to `Complete`.
    pub fn complete(&self) -> Result<()> {
        self.transition(EventStatus::Complete)
    }

    /// Move to the terminal error state.
    pub fn fail(&self, code: i32) -> Result<()> {
        self.transition(EventStatus::Failed(code))
    }

    fn transition(&self, to: EventStatus) -> Result<()> {
        let mut state = self.state.lock();
        let from = state.status;
        let forward = match to {
            EventStatus::Failed(_) => !from.is_terminal(),
            _ => to.rank() > from.rank(),
        };
        if !forward {
            return Err(KilnError::InvalidEventTransition {
                event_id: self.id,
                from,
                to,
            });
        }

        state.status = to;
        if self.profiling_enabled {
            let now = Some(Instant::now());
            match to {
                EventStatus::Submitted => state.profiling.submit = now,
                EventStatus::Running => state.profiling.start = now,
                EventStatus::Complete | EventStatus::Failed(_) => state.profiling.end = now,
                EventStatus::Queued => {}
            }
        }
        drop(state);

        tracing::trace!(event_id = %self.id, from = %from, to = %to, "Event transition");
        Ok(())
    }

    /// Register a callback.
    ///
    /// Callbacks run in registration order when the engine finishes the
    /// owning command. If the event has already reached `trigger`, or its
    /// callbacks have already been delivered, `func` runs immediately on the
    /// calling thread instead. Either way `func` receives `trigger`.
    pub fn add_callback<F>(&self, trigger: EventStatus, func: F)
    where
        F: Fn(&Event, EventStatus) + Send + Sync + 'static,
    {
        let func: CallbackFn = Arc::new(func);
        let mut callbacks = self.callbacks.lock();
        if self.callbacks_fired.load(Ordering::SeqCst) || self.status().has_reached(trigger) {
            drop(callbacks);
            func(self, trigger);
            return;
        }
        callbacks.push(EventCallback { trigger, func });
    }

    /// Number of callbacks waiting for delivery.
    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Deliver every registered callback once, in registration order.
    ///
    /// Each callback receives the trigger status it was registered with. The
    /// callbacks stay registered for the event's own teardown. Returns the
    /// number of callbacks invoked; a second call invokes none.
    pub fn fire_callbacks(&self) -> usize {
        let snapshot: Vec<(EventStatus, CallbackFn)> = {
            let callbacks = self.callbacks.lock();
            if self.callbacks_fired.swap(true, Ordering::SeqCst) {
                return 0;
            }
            callbacks
                .iter()
                .map(|cb| (cb.trigger, Arc::clone(&cb.func)))
                .collect()
        };

        let status = self.status();
        for (trigger, func) in &snapshot {
            tracing::trace!(
                event_id = %self.id,
                trigger = %trigger,
                status = %status,
                "Invoking event callback"
            );
            func(self, *trigger);
        }
        snapshot.len()
    }

    /// Release the engine's handle on this event.
    pub fn release(self: Arc<Self>) {
        self.released.store(true, Ordering::SeqCst);
        tracing::trace!(event_id = %self.id, "Event released");
    }

    /// Whether the engine has released this event.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("queue_id", &self.queue_id)
            .field("command_type", &self.command_type)
            .field("ownership", &self.ownership)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A non-owning reference to an event, held in wait-lists.
#[derive(Debug, Clone)]
pub struct EventRef {
    id: EventId,
    event: Weak<Event>,
}

impl EventRef {
    /// Observe `event` without taking ownership.
    pub fn new(event: &Arc<Event>) -> Self {
        Self {
            id: event.id(),
            event: Arc::downgrade(event),
        }
    }

    /// Identifier of the referenced event.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The event, if anything still owns it.
    pub fn upgrade(&self) -> Option<Arc<Event>> {
        self.event.upgrade()
    }

    /// Current status of the referenced event.
    ///
    /// An event nobody owns any more is reported as `Complete`: its command
    /// held it until finalization, so the command has finished.
    pub fn status(&self) -> EventStatus {
        self.upgrade()
            .map_or(EventStatus::Complete, |event| event.status())
    }
}

impl From<&Arc<Event>> for EventRef {
    fn from(event: &Arc<Event>) -> Self {
        Self::new(event)
    }
}
