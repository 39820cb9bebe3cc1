//! Worker metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single worker thread
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Batches taken from the queue
    batches: AtomicU64,
    /// Commands contained in those batches
    commands: AtomicU64,
    /// Batches whose consume call failed or panicked
    failures: AtomicU64,
}

impl WorkerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch handed to the consumer
    pub fn record_batch(&self, commands: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.commands.fetch_add(commands as u64, Ordering::Relaxed);
    }

    /// Increment failure count
    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            batches: self.batches(),
            commands: self.commands(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of worker metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub batches: u64,
    pub commands: u64,
    pub failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accumulates() {
        let metrics = WorkerMetrics::new();
        metrics.record_batch(3);
        metrics.record_batch(1);
        metrics.inc_failures();

        assert_eq!(
            metrics.snapshot(),
            WorkerSnapshot {
                batches: 2,
                commands: 4,
                failures: 1,
            }
        );
    }
}
