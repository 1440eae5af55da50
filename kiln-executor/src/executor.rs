//! The drain entry point.

use crate::config::ExecutorConfig;
use crate::dispatch::{Dispatcher, ReleaseSummary};
use crate::resolver::Resolver;
use dashmap::DashMap;
use kiln_core::command::{NodeAllocator, SystemAllocator};
use kiln_core::device::Device;
use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent};
use kiln_core::queue::{CommandQueue, QueueProperties};
use kiln_core::types::QueueId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::instrument;

/// Outcome of draining one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub queue_id: QueueId,
    /// Commands executed, including any pulled in from other queues.
    pub executed: usize,
    /// Commands finalized without running because a dependency failed.
    pub cancelled: usize,
    pub released: ReleaseSummary,
}

/// Cumulative executor counters.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    drains: AtomicU64,
    commands_executed: AtomicU64,
    mem_objects_released: AtomicU64,
}

/// Point-in-time copy of [`ExecutorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub drains: u64,
    pub commands_executed: u64,
    pub mem_objects_released: u64,
}

impl ExecutorStats {
    fn record(&self, report: &DrainReport) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.commands_executed
            .fetch_add(report.executed as u64, Ordering::Relaxed);
        self.mem_objects_released
            .fetch_add(report.released.mem_objects as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            drains: self.drains.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            mem_objects_released: self.mem_objects_released.load(Ordering::Relaxed),
        }
    }
}

/// Drains command queues.
///
/// The executor owns a registry of live queues and a resolution lock that
/// serializes the resolution phase of concurrent drains. Dispatch runs
/// outside that lock, so two drains only contend while extracting commands.
pub struct Executor {
    config: ExecutorConfig,
    queues: DashMap<QueueId, Arc<CommandQueue>>,
    resolution_lock: Mutex<()>,
    allocator: Arc<dyn NodeAllocator>,
    log_collector: Arc<dyn LogCollector>,
    stats: ExecutorStats,
}

impl Executor {
    /// Create an executor. Fails if `config` does not validate.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let log_collector = Arc::new(BufferedCollector::new(config.log_capacity));
        Ok(Self {
            config,
            queues: DashMap::new(),
            resolution_lock: Mutex::new(()),
            allocator: Arc::new(SystemAllocator),
            log_collector,
            stats: ExecutorStats::default(),
        })
    }

    /// Return node storage to `allocator` instead of dropping it.
    pub fn with_allocator(mut self, allocator: Arc<dyn NodeAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Send the command log to `collector`.
    pub fn with_collector(mut self, collector: Arc<dyn LogCollector>) -> Self {
        self.log_collector = collector;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn log_collector(&self) -> &Arc<dyn LogCollector> {
        &self.log_collector
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Create a queue on `device` and register it.
    pub fn create_queue(
        &self,
        device: Arc<Device>,
        properties: QueueProperties,
    ) -> Arc<CommandQueue> {
        let queue = CommandQueue::new(device, properties);
        self.queues.insert(queue.id(), Arc::clone(&queue));
        tracing::debug!(queue_id = %queue.id(), ?properties, "Queue created");
        queue
    }

    /// Register an existing queue.
    pub fn register_queue(&self, queue: Arc<CommandQueue>) -> Result<()> {
        let queue_id = queue.id();
        if self.queues.contains_key(&queue_id) {
            return Err(KilnError::QueueExists { queue_id });
        }
        self.queues.insert(queue_id, queue);
        Ok(())
    }

    /// Remove a queue from the registry.
    ///
    /// Commands still pending on it stay with the returned handle.
    pub fn release_queue(&self, queue_id: QueueId) -> Result<Arc<CommandQueue>> {
        self.queues
            .remove(&queue_id)
            .map(|(_, queue)| queue)
            .ok_or(KilnError::InvalidCommandQueue { queue_id })
    }

    /// Look up a registered queue.
    pub fn queue(&self, queue_id: QueueId) -> Result<Arc<CommandQueue>> {
        self.queues
            .get(&queue_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(KilnError::InvalidCommandQueue { queue_id })
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Drain a registered queue.
    ///
    /// Returns `InvalidCommandQueue` without touching anything if `queue_id`
    /// is not registered. Otherwise blocks until every command currently
    /// resolvable from the queue has been executed and finalized.
    #[instrument(skip(self, queue_id), fields(queue_id = %queue_id))]
    pub fn finish(&self, queue_id: QueueId) -> Result<DrainReport> {
        let queue = self.queue(queue_id).inspect_err(|err| {
            tracing::warn!(error = %err, "Drain requested for unknown queue");
        })?;
        Ok(self.finish_queue(&queue))
    }

    /// Drain `queue`, registered or not.
    #[instrument(skip(self, queue), fields(queue_id = %queue.id(), pending = queue.len()))]
    pub fn finish_queue(&self, queue: &Arc<CommandQueue>) -> DrainReport {
        let queue_id = queue.id();
        self.log_collector.collect(
            LogEvent::info(LogCategory::Queue, "Drain started")
                .with_queue_id(queue_id)
                .with_field("pending", queue.len()),
        );

        let batch = {
            let _resolution = self.resolution_lock.lock();
            Resolver::new(
                queue,
                self.config.cursor_policy,
                self.config.fatal_action,
                self.log_collector.as_ref(),
            )
            .run()
        };
        tracing::debug!(ready = batch.len(), "Resolution complete");

        let summary = Dispatcher::new(
            self.allocator.as_ref(),
            self.log_collector.as_ref(),
            self.config.fatal_action,
        )
        .dispatch(batch);

        let report = DrainReport {
            queue_id,
            executed: summary.executed,
            cancelled: summary.cancelled,
            released: summary.released,
        };
        self.stats.record(&report);

        self.log_collector.collect(
            LogEvent::info(LogCategory::Queue, "Drain finished")
                .with_queue_id(queue_id)
                .with_field("executed", report.executed)
                .with_field("cancelled", report.cancelled)
                .with_field("mem_objects_released", report.released.mem_objects)
                .with_field("kernels_released", report.released.kernels),
        );
        tracing::info!(
            executed = report.executed,
            cancelled = report.cancelled,
            mem_objects_released = report.released.mem_objects,
            "Queue drained"
        );
        report
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("queues", &self.queues.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::testing::test_device;

    fn executor() -> Executor {
        Executor::new(ExecutorConfig::default().with_fatal_action(kiln_core::FatalAction::Panic))
            .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Executor::new(ExecutorConfig::default().with_log_capacity(0)).unwrap_err();
        assert_eq!(err.code(), "E901");
    }

    #[test]
    fn registry_lifecycle() {
        let exec = executor();
        let queue = exec.create_queue(test_device(), QueueProperties::empty());
        assert_eq!(exec.queue_count(), 1);
        assert!(Arc::ptr_eq(&exec.queue(queue.id()).unwrap(), &queue));

        let err = exec.register_queue(Arc::clone(&queue)).unwrap_err();
        assert_eq!(err.code(), "E002");

        exec.release_queue(queue.id()).unwrap();
        assert_eq!(exec.queue_count(), 0);
        assert!(matches!(
            exec.queue(queue.id()),
            Err(KilnError::InvalidCommandQueue { .. })
        ));
        assert!(exec.release_queue(queue.id()).is_err());
    }

    #[test]
    fn draining_empty_queue_reports_nothing() {
        let exec = executor();
        let queue = exec.create_queue(test_device(), QueueProperties::empty());
        let report = exec.finish(queue.id()).unwrap();
        assert_eq!(report.executed, 0);
        assert!(report.released.is_empty());
        assert_eq!(exec.stats().drains, 1);
    }
}
