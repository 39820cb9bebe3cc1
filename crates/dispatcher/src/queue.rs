//! ConsumerQueue - unbounded FIFO of batches with cooperative stop

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use contracts::Batch;

use crate::error::DispatcherError;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Batch>,
    stopping: bool,
}

/// Per-consumer queue shared by the bus (producer side) and one worker pool.
///
/// Stopping refuses new pushes but never discards queued batches: `take`
/// keeps handing them out until the queue is empty.
#[derive(Debug)]
pub struct ConsumerQueue {
    name: String,
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ConsumerQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Every critical section leaves the state consistent, so a poisoned
    // lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch and wake one waiting worker.
    ///
    /// Never blocks on consumers. Fails only once `stop` has been called.
    pub fn push(&self, batch: Batch) -> Result<usize, DispatcherError> {
        let depth = {
            let mut state = self.lock();
            if state.stopping {
                return Err(DispatcherError::QueueStopped {
                    consumer: self.name.clone(),
                    seq: batch.seq(),
                });
            }
            state.items.push_back(batch);
            state.items.len()
        };
        self.available.notify_one();
        Ok(depth)
    }

    /// Block until a batch is available or the queue is stopped and drained.
    ///
    /// Returns `None` only when stopping and empty: no more work, ever.
    pub fn take(&self) -> Option<Batch> {
        let mut state = self
            .available
            .wait_while(self.lock(), |state| {
                state.items.is_empty() && !state.stopping
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.items.pop_front()
    }

    /// Refuse further pushes and wake every waiting worker
    pub fn stop(&self) {
        self.lock().stopping = true;
        self.available.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.lock().stopping
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
