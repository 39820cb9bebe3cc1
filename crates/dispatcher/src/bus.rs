//! DispatchBus - fans every sealed batch out to all consumer queues

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Batch, BatchPublisher};
use observability::{record_batch_rejected, record_queue_depth};
use tracing::{error, instrument, trace};

use crate::error::DispatcherError;
use crate::queue::ConsumerQueue;

/// Publisher side of the dispatcher, owned by the producer
///
/// Pushes never wait on consumers: a slow consumer only grows its own queue.
#[derive(Debug, Default)]
pub struct DispatchBus {
    queues: Vec<Arc<ConsumerQueue>>,
    published: AtomicU64,
    rejected: AtomicU64,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer queue; publishing follows registration order
    pub fn register(&mut self, queue: Arc<ConsumerQueue>) {
        self.queues.push(queue);
    }

    /// Names of registered consumers, in registration order
    pub fn consumers(&self) -> Vec<&str> {
        self.queues.iter().map(|q| q.name()).collect()
    }

    /// Batches handed to `publish`
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Pushes refused because a queue was already stopping
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn push_to(&self, queue: &ConsumerQueue, batch: Batch) {
        match queue.push(batch) {
            Ok(depth) => record_queue_depth(queue.name(), depth),
            Err(e @ DispatcherError::QueueStopped { .. }) => {
                // Publishing after shutdown started is a sequencing bug
                self.rejected.fetch_add(1, Ordering::Relaxed);
                record_batch_rejected(queue.name());
                error!(consumer = %queue.name(), error = %e, "Batch rejected");
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                error!(consumer = %queue.name(), error = %e, "Push failed");
            }
        }
    }
}

impl BatchPublisher for DispatchBus {
    #[instrument(
        name = "dispatch_bus_publish",
        skip(self, batch),
        fields(seq = batch.seq(), size = batch.len())
    )]
    fn publish(&self, batch: Batch) {
        self.published.fetch_add(1, Ordering::Relaxed);
        for queue in &self.queues {
            self.push_to(queue, batch.clone());
        }
        trace!(consumers = self.queues.len(), "Batch published");
    }
}
