//! WorkerPool - a consumer with its own queue and named worker threads

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::BatchConsumer;
use observability::{record_batch_consumed, record_queue_depth};
use tracing::{debug, error, instrument};

use crate::error::DispatcherError;
use crate::metrics::{WorkerMetrics, WorkerSnapshot};
use crate::queue::ConsumerQueue;

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Worker {
    name: String,
    metrics: Arc<WorkerMetrics>,
    handle: JoinHandle<()>,
}

/// Running worker pool for one consumer
///
/// Workers are the only readers of the pool's queue. With more than one
/// worker, batches of the same consumer may be consumed concurrently and
/// out of seal order; a single worker keeps strict order.
pub struct WorkerPool {
    /// Consumer name
    name: String,
    /// Shared by every worker
    consumer: Arc<dyn BatchConsumer>,
    /// Fed by the DispatchBus
    queue: Arc<ConsumerQueue>,
    workers: Vec<Worker>,
}

/// Per-worker counters of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub consumer: String,
    pub workers: Vec<WorkerReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub snapshot: WorkerSnapshot,
}

impl PoolReport {
    /// Batches consumed by all workers of the pool
    pub fn total_batches(&self) -> u64 {
        self.workers.iter().map(|w| w.snapshot.batches).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.workers.iter().map(|w| w.snapshot.failures).sum()
    }
}

/// Outcome of joining a pool's workers
pub(crate) struct PoolJoin {
    pub report: PoolReport,
    /// Workers still running at the deadline (detached)
    pub stuck: Vec<String>,
    /// Workers whose thread panicked outside the consume call
    pub panicked: Vec<(String, String)>,
}

impl WorkerPool {
    /// Create the pool's queue and spawn one named thread per worker identity
    #[instrument(
        name = "worker_pool_spawn",
        skip(consumer, worker_names),
        fields(consumer = %consumer.name(), workers = worker_names.len())
    )]
    pub fn spawn(
        consumer: Arc<dyn BatchConsumer>,
        worker_names: Vec<String>,
    ) -> Result<Self, DispatcherError> {
        let name = consumer.name().to_string();
        if worker_names.is_empty() {
            return Err(DispatcherError::consumer_creation(
                &name,
                "a worker pool needs at least one worker",
            ));
        }

        let mut pool = Self {
            queue: Arc::new(ConsumerQueue::new(&name)),
            name,
            consumer,
            workers: Vec::with_capacity(worker_names.len()),
        };

        for worker_name in worker_names {
            let metrics = Arc::new(WorkerMetrics::new());
            let spawned = {
                let consumer = Arc::clone(&pool.consumer);
                let queue = Arc::clone(&pool.queue);
                let metrics = Arc::clone(&metrics);
                let name = worker_name.clone();
                thread::Builder::new()
                    .name(worker_name.clone())
                    .spawn(move || worker_loop(consumer, queue, metrics, name))
            };

            match spawned {
                Ok(handle) => pool.workers.push(Worker {
                    name: worker_name,
                    metrics,
                    handle,
                }),
                Err(source) => {
                    // Release the workers that did start
                    pool.stop();
                    pool.join(None);
                    return Err(DispatcherError::WorkerSpawn {
                        worker: worker_name,
                        source,
                    });
                }
            }
        }

        debug!(consumer = %pool.name, workers = pool.workers.len(), "Worker pool started");
        Ok(pool)
    }

    /// Consumer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue to register on the DispatchBus
    pub fn queue(&self) -> Arc<ConsumerQueue> {
        Arc::clone(&self.queue)
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    /// Current per-worker counters
    pub fn report(&self) -> PoolReport {
        PoolReport {
            consumer: self.name.clone(),
            workers: self
                .workers
                .iter()
                .map(|w| WorkerReport {
                    name: w.name.clone(),
                    snapshot: w.metrics.snapshot(),
                })
                .collect(),
        }
    }

    /// Stop accepting batches; workers drain what is queued, then exit
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// Wait for every worker to exit, then close the consumer.
    ///
    /// With a deadline, workers still running when it passes are detached
    /// and reported as stuck; the consumer is then left open.
    #[instrument(name = "worker_pool_join", skip(self, deadline), fields(consumer = %self.name))]
    pub(crate) fn join(self, deadline: Option<Instant>) -> PoolJoin {
        let mut workers = Vec::with_capacity(self.workers.len());
        let mut stuck = Vec::new();
        let mut panicked = Vec::new();

        for worker in self.workers {
            let mut finished = true;
            if let Some(deadline) = deadline {
                while !worker.handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(JOIN_POLL_INTERVAL);
                }
                finished = worker.handle.is_finished();
            }

            if !finished {
                error!(consumer = %self.name, worker = %worker.name, "Worker did not drain before deadline");
                stuck.push(worker.name.clone());
            } else if let Err(payload) = worker.handle.join() {
                let message = panic_message(payload.as_ref());
                error!(consumer = %self.name, worker = %worker.name, panic = %message, "Worker thread panicked");
                panicked.push((worker.name.clone(), message));
            }

            workers.push(WorkerReport {
                name: worker.name,
                snapshot: worker.metrics.snapshot(),
            });
        }

        if stuck.is_empty() {
            if let Err(e) = self.consumer.close() {
                error!(consumer = %self.name, error = %e, "Close failed on shutdown");
            }
        }

        debug!(consumer = %self.name, "Worker pool joined");
        PoolJoin {
            report: PoolReport {
                consumer: self.name,
                workers,
            },
            stuck,
            panicked,
        }
    }
}

/// Worker thread body: take, consume, repeat until the queue is drained and stopped
#[instrument(
    name = "worker_loop",
    skip_all,
    fields(consumer = %queue.name(), worker = %worker)
)]
fn worker_loop(
    consumer: Arc<dyn BatchConsumer>,
    queue: Arc<ConsumerQueue>,
    metrics: Arc<WorkerMetrics>,
    worker: String,
) {
    debug!(worker = %worker, "Worker started");

    while let Some(batch) = queue.take() {
        record_queue_depth(queue.name(), queue.len());
        metrics.record_batch(batch.len());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| consumer.consume(&batch)));
        let success = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(
                    worker = %worker,
                    seq = batch.seq(),
                    error = %e,
                    "Consume failed"
                );
                false
            }
            Err(payload) => {
                error!(
                    worker = %worker,
                    seq = batch.seq(),
                    panic = %panic_message(payload.as_ref()),
                    "Consumer panicked"
                );
                false
            }
        };

        // Continue processing - one bad batch must not stop the pool
        if !success {
            metrics.inc_failures();
        }
        record_batch_consumed(queue.name(), success);
    }

    debug!(
        worker = %worker,
        batches = metrics.batches(),
        commands = metrics.commands(),
        "Worker stopped"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Batch, ContractError};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn batch(seq: u64) -> Batch {
        Batch::new(seq, vec![format!("cmd{seq}"), "x".to_string()], Utc::now()).unwrap()
    }

    /// Records (thread name, seq) of every consumed batch
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, u64)>>,
        closed: AtomicBool,
    }

    impl BatchConsumer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
            let thread = thread::current().name().unwrap_or_default().to_string();
            self.seen.lock().unwrap().push((thread, batch.seq()));
            Ok(())
        }

        fn close(&self) -> Result<(), ContractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails on even seqs, panics on seq 3
    struct Flaky;

    impl BatchConsumer for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
            match batch.seq() {
                3 => panic!("boom on 3"),
                seq if seq % 2 == 0 => Err(ContractError::consumer_write("flaky", seq, "even")),
                _ => Ok(()),
            }
        }
    }

    struct Slow(Duration);

    impl BatchConsumer for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn consume(&self, _batch: &Batch) -> Result<(), ContractError> {
            thread::sleep(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_spawn_requires_workers() {
        let result = WorkerPool::spawn(Arc::new(Recording::default()), vec![]);
        assert!(matches!(
            result,
            Err(DispatcherError::ConsumerCreation { .. })
        ));
    }

    #[test]
    fn test_single_worker_keeps_order_and_closes() {
        let consumer = Arc::new(Recording::default());
        let pool = WorkerPool::spawn(consumer.clone(), vec!["rec-0".to_string()]).unwrap();
        assert_eq!(pool.worker_names(), vec!["rec-0"]);

        let queue = pool.queue();
        for seq in 1..=20 {
            queue.push(batch(seq)).unwrap();
        }
        pool.stop();
        let joined = pool.join(None);

        let seen = consumer.seen.lock().unwrap().clone();
        let seqs: Vec<u64> = seen.iter().map(|(_, seq)| *seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
        assert!(seen.iter().all(|(thread, _)| thread == "rec-0"));
        assert!(consumer.closed.load(Ordering::SeqCst));

        assert!(joined.stuck.is_empty());
        assert_eq!(joined.report.total_batches(), 20);
        assert_eq!(joined.report.workers[0].snapshot.commands, 40);
    }

    #[test]
    fn test_multiple_workers_consume_each_batch_once() {
        let consumer = Arc::new(Recording::default());
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let pool = WorkerPool::spawn(consumer.clone(), names).unwrap();

        let queue = pool.queue();
        for seq in 1..=100 {
            queue.push(batch(seq)).unwrap();
        }
        pool.stop();
        let joined = pool.join(None);

        let seen = consumer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 100);
        let unique: HashSet<u64> = seen.iter().map(|(_, seq)| *seq).collect();
        assert_eq!(unique.len(), 100);
        assert!(seen
            .iter()
            .all(|(thread, _)| ["a", "b", "c"].contains(&thread.as_str())));
        assert_eq!(joined.report.total_batches(), 100);
    }

    #[test]
    fn test_failures_and_panics_do_not_stop_worker() {
        let pool = WorkerPool::spawn(Arc::new(Flaky), vec!["flaky-0".to_string()]).unwrap();
        let queue = pool.queue();
        for seq in 1..=6 {
            queue.push(batch(seq)).unwrap();
        }
        pool.stop();
        let joined = pool.join(None);

        // 2, 4, 6 fail; 3 panics
        let snapshot = joined.report.workers[0].snapshot;
        assert_eq!(snapshot.batches, 6);
        assert_eq!(snapshot.failures, 4);
        assert!(joined.panicked.is_empty());
    }

    #[test]
    fn test_join_deadline_reports_stuck_worker() {
        let pool = WorkerPool::spawn(
            Arc::new(Slow(Duration::from_millis(500))),
            vec!["slow-0".to_string()],
        )
        .unwrap();
        pool.queue().push(batch(1)).unwrap();
        pool.stop();

        let joined = pool.join(Some(Instant::now() + Duration::from_millis(50)));
        assert_eq!(joined.stuck, vec!["slow-0".to_string()]);
    }

    /// Panic payload that panics again when dropped
    struct PanicOnDrop;

    impl Drop for PanicOnDrop {
        fn drop(&mut self) {
            panic!("payload dropped");
        }
    }

    /// Kills its worker thread outside the guarded consume call
    #[derive(Default)]
    struct Fatal {
        closed: AtomicBool,
    }

    impl BatchConsumer for Fatal {
        fn name(&self) -> &str {
            "fatal"
        }

        fn consume(&self, _batch: &Batch) -> Result<(), ContractError> {
            std::panic::panic_any(PanicOnDrop)
        }

        fn close(&self) -> Result<(), ContractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_join_reports_dead_worker_thread() {
        let consumer = Arc::new(Fatal::default());
        let pool = WorkerPool::spawn(consumer.clone(), vec!["fatal-0".to_string()]).unwrap();
        pool.queue().push(batch(1)).unwrap();
        pool.stop();

        let joined = pool.join(None);
        assert!(joined.stuck.is_empty());
        assert_eq!(
            joined.panicked,
            vec![("fatal-0".to_string(), "payload dropped".to_string())]
        );
        // The thread is gone, so the consumer can still be closed
        assert!(consumer.closed.load(Ordering::SeqCst));
    }
}
