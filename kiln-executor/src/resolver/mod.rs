//! Dependency resolution.
//!
//! The resolver turns a queue's pending list into a [`ReadyBatch`]: every
//! command whose wait-list is satisfied, in the order it was extracted. It
//! keeps extracting until the target queue is empty.
//!
//! When the command at the front of the current queue is blocked, the
//! resolver moves its cursor to the queue that owns the blocking event and
//! extracts from there instead, so the prerequisite lands in the batch ahead
//! of its dependent. The cursor returns to the target queue once the foreign
//! queue runs dry.
//!
//! ```text
//!   Draining { cursor: Target } ──blocked on event of Q──▶ Draining { cursor: Foreign(Q) }
//!          ▲                                                        │
//!          └──────────────── Q empty (CursorReset) ─────────────────┘
//!   target empty ──▶ Done
//! ```
//!
//! # Locking
//!
//! The caller holds the executor's resolution lock, which serializes
//! resolution phases. The target queue's pending list stays locked for the
//! whole phase. A foreign queue's pending list is locked only for the single
//! peek-and-pop step taken on it.
//!
//! # Failed dependencies
//!
//! A command waiting on a `Failed` event can never run. The resolver takes
//! it out of its queue, fails its event with the same code and hands it to
//! the dispatcher as cancelled, so dependents further down fail in turn.
//!
//! # Unwinding
//!
//! If a fatal condition unwinds resolution under [`FatalAction::Panic`], the
//! events of everything already admitted are failed before the batch is
//! dropped. Nothing downstream treats them as satisfied.
//!
//! # Termination
//!
//! Resolution ends when the target queue is empty. A dependency that never
//! becomes satisfiable (a cycle, or an event no queue will ever submit) keeps
//! the resolver spinning; enqueue discipline is expected to rule that out.

mod batch;

pub use batch::ReadyBatch;
pub(crate) use batch::abandon_events;

use crate::config::CursorPolicy;
use kiln_core::command::CommandNode;
use kiln_core::event::{Event, EventStatus};
use kiln_core::fatal::{ABANDONED_EVENT_CODE, FatalAction, FatalCondition, raise_fatal};
use kiln_core::logging::{LogCategory, LogCollector, LogEvent};
use kiln_core::queue::CommandQueue;
use kiln_core::types::{CommandId, EventId, QueueId};
use parking_lot::MutexGuard;
use std::collections::VecDeque;
use std::sync::Arc;

/// Where the resolver reads its next command from.
#[derive(Debug, Clone)]
pub enum Cursor {
    /// The queue being drained.
    Target,
    /// Another queue owning a blocking dependency.
    Foreign(Arc<CommandQueue>),
}

/// Resolver state.
#[derive(Debug, Clone)]
pub enum ResolveState {
    Draining { cursor: Cursor },
    Done,
}

/// What a single resolver step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A command was moved into the ready batch.
    Admitted {
        command_id: CommandId,
        queue_id: QueueId,
    },
    /// The front command is blocked; the cursor now points at `queue_id`.
    Blocked { on: EventId, queue_id: QueueId },
    /// The front command depends on a failed event and was cancelled.
    Cancelled {
        command_id: CommandId,
        queue_id: QueueId,
        failed: EventId,
    },
    /// The foreign queue under the cursor was empty; back to the target.
    CursorReset,
}

/// Incremental resolver over one target queue.
pub struct Resolver<'a> {
    target: &'a Arc<CommandQueue>,
    target_pending: MutexGuard<'a, VecDeque<CommandNode>>,
    policy: CursorPolicy,
    log: &'a dyn LogCollector,
    fatal_action: FatalAction,
    state: ResolveState,
    batch: ReadyBatch,
}

impl<'a> Resolver<'a> {
    /// Lock `target` and start resolving it.
    ///
    /// An out-of-order queue is a fatal condition; nothing is extracted.
    pub fn new(
        target: &'a Arc<CommandQueue>,
        policy: CursorPolicy,
        fatal_action: FatalAction,
        log: &'a dyn LogCollector,
    ) -> Self {
        if target.is_out_of_order() {
            log.collect(
                LogEvent::error(LogCategory::System, "Out-of-order queue cannot be drained")
                    .with_queue_id(target.id()),
            );
            raise_fatal(
                FatalCondition::OutOfOrderQueue {
                    queue_id: target.id(),
                },
                fatal_action,
            );
        }

        let target_pending = target.lock_pending();
        let state = if target_pending.is_empty() {
            ResolveState::Done
        } else {
            ResolveState::Draining {
                cursor: Cursor::Target,
            }
        };

        Self {
            target,
            target_pending,
            policy,
            log,
            fatal_action,
            state,
            batch: ReadyBatch::default(),
        }
    }

    pub fn state(&self) -> &ResolveState {
        &self.state
    }

    /// Commands admitted so far.
    pub fn batch(&self) -> &ReadyBatch {
        &self.batch
    }

    /// Take one step. Returns `None` once the target queue is empty.
    pub fn step(&mut self) -> Option<StepOutcome> {
        let cursor = match &self.state {
            ResolveState::Done => return None,
            ResolveState::Draining { cursor } => cursor.clone(),
        };

        if self.target_pending.is_empty() {
            self.state = ResolveState::Done;
            return None;
        }

        let outcome = match cursor {
            Cursor::Target => {
                let queue_id = self.target.id();
                let front = self.target_pending.front()?;
                let command_id = front.id();
                match readiness(front, self.policy) {
                    Readiness::Blocked(event) => self.follow(command_id, &event),
                    Readiness::Ready => {
                        let node = self.target_pending.pop_front()?;
                        self.admit(node, queue_id)
                    }
                    Readiness::DependencyFailed(event) => {
                        let node = self.target_pending.pop_front()?;
                        self.cancel(node, queue_id, &event)
                    }
                }
            }
            Cursor::Foreign(queue) => {
                let mut pending = queue.lock_pending();
                match pending.front() {
                    None => {
                        drop(pending);
                        self.state = ResolveState::Draining {
                            cursor: Cursor::Target,
                        };
                        tracing::trace!(queue_id = %queue.id(), "Foreign queue empty, cursor reset");
                        StepOutcome::CursorReset
                    }
                    Some(front) => match readiness(front, self.policy) {
                        Readiness::Blocked(event) => {
                            let command_id = front.id();
                            drop(pending);
                            self.follow(command_id, &event)
                        }
                        Readiness::Ready => {
                            let node = pending.pop_front()?;
                            drop(pending);
                            self.admit(node, queue.id())
                        }
                        Readiness::DependencyFailed(event) => {
                            let node = pending.pop_front()?;
                            drop(pending);
                            self.cancel(node, queue.id(), &event)
                        }
                    },
                }
            }
        };

        if self.target_pending.is_empty() {
            self.state = ResolveState::Done;
        }
        Some(outcome)
    }

    /// Run to completion and return the batch.
    pub fn run(mut self) -> ReadyBatch {
        while self.step().is_some() {}
        self.finish()
    }

    /// Release the target lock and return what was admitted.
    pub fn finish(mut self) -> ReadyBatch {
        std::mem::take(&mut self.batch)
    }

    fn admit(&mut self, node: CommandNode, queue_id: QueueId) -> StepOutcome {
        let command_id = node.id();
        let event_id = node.event().map(|e| e.id());
        if let Some(event) = node.event() {
            if let Err(err) = event.submit() {
                tracing::warn!(command_id = %command_id, error = %err, "Admitted command with advanced event");
            }
        }

        tracing::trace!(
            queue_id = %queue_id,
            command_id = %command_id,
            command_type = %node.command_type(),
            "Command admitted"
        );
        self.log.collect(
            LogEvent::debug(LogCategory::Command, "Command admitted")
                .with_queue_id(queue_id)
                .with_command_id(command_id)
                .with_event_id(event_id)
                .with_field("command_type", node.command_type().as_str()),
        );

        self.batch.push(node);
        StepOutcome::Admitted {
            command_id,
            queue_id,
        }
    }

    fn cancel(&mut self, node: CommandNode, queue_id: QueueId, failed: &Event) -> StepOutcome {
        let command_id = node.id();
        let code = match failed.status() {
            EventStatus::Failed(code) => code,
            _ => ABANDONED_EVENT_CODE,
        };
        if let Some(event) = node.event() {
            if let Err(err) = event.fail(code) {
                tracing::warn!(command_id = %command_id, error = %err, "Cancelled command with finished event");
            }
        }

        tracing::debug!(
            queue_id = %queue_id,
            command_id = %command_id,
            failed = %failed.id(),
            "Command cancelled, dependency failed"
        );
        self.log.collect(
            LogEvent::warn(LogCategory::Command, "Command cancelled")
                .with_queue_id(queue_id)
                .with_command_id(command_id)
                .with_event_id(node.event().map(|e| e.id()))
                .with_field("failed_dependency", failed.id().to_string())
                .with_field("error_code", code),
        );

        self.batch.push_cancelled(node);
        StepOutcome::Cancelled {
            command_id,
            queue_id,
            failed: failed.id(),
        }
    }

    fn follow(&mut self, command_id: CommandId, event: &Arc<Event>) -> StepOutcome {
        let Some(queue) = event.queue() else {
            self.log.collect(
                LogEvent::error(LogCategory::System, "Blocking dependency has no queue")
                    .with_queue_id(event.queue_id())
                    .with_command_id(command_id)
                    .with_event_id(Some(event.id())),
            );
            raise_fatal(
                FatalCondition::OrphanedDependency {
                    event_id: event.id(),
                    queue_id: event.queue_id(),
                },
                self.fatal_action,
            );
        };

        let queue_id = queue.id();
        let cursor = if Arc::ptr_eq(&queue, self.target) {
            Cursor::Target
        } else {
            Cursor::Foreign(queue)
        };
        tracing::trace!(
            command_id = %command_id,
            blocked_on = %event.id(),
            queue_id = %queue_id,
            "Command blocked, following dependency"
        );
        self.state = ResolveState::Draining { cursor };
        StepOutcome::Blocked {
            on: event.id(),
            queue_id,
        }
    }
}

impl Drop for Resolver<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let failed = self.batch.abandon();
            tracing::warn!(queue_id = %self.target.id(), failed, "Resolution unwound, admitted events failed");
        }
    }
}

enum Readiness {
    Ready,
    /// The wait-list entry the cursor should follow.
    Blocked(Arc<Event>),
    DependencyFailed(Arc<Event>),
}

/// Classify the front command by its wait-list.
///
/// Every entry is inspected. Any failed entry cancels the command; otherwise
/// under [`CursorPolicy::LastBlocking`] the last unsatisfied entry wins.
fn readiness(node: &CommandNode, policy: CursorPolicy) -> Readiness {
    let mut blocking: Option<Arc<Event>> = None;
    for entry in node.wait_list() {
        let Some(event) = entry.upgrade() else {
            continue;
        };
        let status = event.status();
        if matches!(status, EventStatus::Failed(_)) {
            return Readiness::DependencyFailed(event);
        }
        if status.satisfies_dependency() {
            continue;
        }
        if blocking.is_none() || policy == CursorPolicy::LastBlocking {
            blocking = Some(event);
        }
    }
    blocking.map_or(Readiness::Ready, Readiness::Blocked)
}

/// Resolve `target` into a ready batch.
pub fn resolve(
    target: &Arc<CommandQueue>,
    policy: CursorPolicy,
    fatal_action: FatalAction,
    log: &dyn LogCollector,
) -> ReadyBatch {
    Resolver::new(target, policy, fatal_action, log).run()
}
