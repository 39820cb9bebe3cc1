//! ShutdownCoordinator - flush, stop, drain, join

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::BatchSealer;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::WorkerSnapshot;
use crate::pool::{PoolReport, WorkerPool};

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Default)]
struct TriggerInner {
    fired: AtomicBool,
    notify: Notify,
}

/// Zero-argument termination callback handed to the signal layer
///
/// Cloneable; only the first `fire` is acted upon.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    inner: Arc<TriggerInner>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Returns `true` only for the first call.
    pub fn fire(&self) -> bool {
        let first = !self.inner.fired.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Resolve once `fire` has been called (immediately if it already was)
    pub async fn fired(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Result of a completed drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sequence number of the batch flushed from the accumulator, if any
    pub flushed_seq: Option<u64>,
    pub pools: Vec<PoolReport>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// (worker name, counters) for every worker of every pool
    pub fn workers(&self) -> impl Iterator<Item = (&str, WorkerSnapshot)> {
        self.pools
            .iter()
            .flat_map(|p| p.workers.iter())
            .map(|w| (w.name.as_str(), w.snapshot))
    }

    pub fn pool(&self, consumer: &str) -> Option<&PoolReport> {
        self.pools.iter().find(|p| p.consumer == consumer)
    }
}

/// Owns the worker pools and drives graceful termination
///
/// `Running -> Draining -> Stopped`. The first `shutdown` call performs the
/// drain; later calls return `Ok(None)`.
pub struct ShutdownCoordinator {
    state: Mutex<ShutdownState>,
    pools: Mutex<Vec<WorkerPool>>,
    drain_timeout: Option<Duration>,
    trigger: ShutdownTrigger,
}

impl ShutdownCoordinator {
    pub fn new(pools: Vec<WorkerPool>) -> Self {
        Self {
            state: Mutex::new(ShutdownState::Running),
            pools: Mutex::new(pools),
            drain_timeout: None,
            trigger: ShutdownTrigger::new(),
        }
    }

    /// Bound the drain; default is to wait for every worker
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout
    }

    /// Trigger shared with whoever requests termination
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn state(&self) -> ShutdownState {
        *lock(&self.state)
    }

    /// Live counters of pools not yet joined
    pub fn report(&self) -> Vec<PoolReport> {
        lock(&self.pools).iter().map(WorkerPool::report).collect()
    }

    /// Flush the sealer, stop every queue, wait for all workers to drain.
    ///
    /// Returns `Ok(None)` when shutdown already ran or is running.
    #[instrument(name = "shutdown_coordinator_shutdown", skip(self, sealer))]
    pub fn shutdown(
        &self,
        sealer: &mut dyn BatchSealer,
    ) -> Result<Option<ShutdownReport>, DispatcherError> {
        {
            let mut state = lock(&self.state);
            if *state != ShutdownState::Running {
                debug!(state = ?*state, "Shutdown already requested");
                return Ok(None);
            }
            *state = ShutdownState::Draining;
        }
        self.trigger.fire();

        let started = Instant::now();
        info!("Shutdown started, flushing partial batch");

        // Flush goes through the bus while queues still accept pushes
        let flushed_seq = sealer.seal_pending();

        let pools = std::mem::take(&mut *lock(&self.pools));
        for pool in &pools {
            pool.stop();
        }

        let deadline = self.drain_timeout.map(|timeout| started + timeout);
        let mut reports = Vec::with_capacity(pools.len());
        let mut stuck = Vec::new();
        let mut panicked = Vec::new();
        for pool in pools {
            let joined = pool.join(deadline);
            reports.push(joined.report);
            stuck.extend(joined.stuck);
            panicked.extend(joined.panicked);
        }

        *lock(&self.state) = ShutdownState::Stopped;
        let elapsed = started.elapsed();

        if !stuck.is_empty() {
            warn!(workers = ?stuck, "Shutdown finished with stuck workers");
            return Err(DispatcherError::DrainTimeout {
                waited_ms: elapsed.as_millis() as u64,
                workers: stuck,
            });
        }
        if let Some((worker, message)) = panicked.into_iter().next() {
            return Err(DispatcherError::worker_join(worker, message));
        }

        info!(
            pools = reports.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            flushed_seq = ?flushed_seq,
            "Shutdown complete"
        );
        Ok(Some(ShutdownReport {
            flushed_seq,
            pools: reports,
            elapsed,
        }))
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        // Never shut down: let workers drain and exit on their own
        for pool in lock(&self.pools).iter() {
            pool.stop();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
