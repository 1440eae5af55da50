//! Log collectors.

use super::event::{LogCategory, LogEvent, LogLevel};
use crate::types::{CommandId, EventId, QueueId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of events a [`BufferedCollector`] keeps.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Sink for command log events.
pub trait LogCollector: Send + Sync {
    fn collect(&self, event: LogEvent);

    /// Number of events currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Callback notified of every collected event.
pub type LogSubscriber = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Thread-safe collector backed by a bounded ring buffer.
///
/// Once full, the oldest event is evicted for each new one.
pub struct BufferedCollector {
    buffer: RwLock<VecDeque<LogEvent>>,
    capacity: usize,
    next_id: AtomicU64,
    evicted: AtomicU64,
    subscribers: RwLock<Vec<LogSubscriber>>,
}

impl BufferedCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_id: AtomicU64::new(1),
            evicted: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }

    /// Register a callback run synchronously for every collected event.
    pub fn subscribe(&self, callback: LogSubscriber) {
        self.subscribers.write().push(callback);
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Events correlated with a queue.
    pub fn by_queue(&self, queue_id: QueueId) -> Vec<LogEvent> {
        self.filtered(|e| e.queue_id == Some(queue_id))
    }

    /// Events correlated with a command.
    pub fn by_command(&self, command_id: CommandId) -> Vec<LogEvent> {
        self.filtered(|e| e.command_id == Some(command_id))
    }

    /// Events correlated with an event.
    pub fn by_event(&self, event_id: EventId) -> Vec<LogEvent> {
        self.filtered(|e| e.event_id == Some(event_id))
    }

    pub fn by_category(&self, category: LogCategory) -> Vec<LogEvent> {
        self.filtered(|e| e.category == category)
    }

    /// Events at or above `min_level`.
    pub fn by_level(&self, min_level: LogLevel) -> Vec<LogEvent> {
        self.filtered(|e| e.level >= min_level)
    }

    /// Every held event, oldest first.
    pub fn all(&self) -> Vec<LogEvent> {
        self.buffer.read().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.buffer.write().clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events pushed out of the full buffer so far.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn filtered(&self, pred: impl Fn(&LogEvent) -> bool) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().filter(|e| pred(e)).cloned().collect()
    }
}

impl LogCollector for BufferedCollector {
    fn collect(&self, mut event: LogEvent) {
        event.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                subscriber(&event);
            }
        }

        if self.capacity == 0 {
            return;
        }
        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(event);
    }

    fn len(&self) -> usize {
        self.buffer.read().len()
    }
}

impl Default for BufferedCollector {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Collector that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl LogCollector for NullCollector {
    fn collect(&self, _event: LogEvent) {}

    fn len(&self) -> usize {
        0
    }
}
