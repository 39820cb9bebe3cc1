//! Producer-side seams between the accumulator and the dispatch layer.

use crate::Batch;

/// Receives every sealed batch, in seal order.
///
/// Called from the single producer thread. Implementations must not block
/// on consumers.
pub trait BatchPublisher {
    fn publish(&self, batch: Batch);
}

impl<P: BatchPublisher + ?Sized> BatchPublisher for &P {
    fn publish(&self, batch: Batch) {
        (**self).publish(batch)
    }
}

/// Producer state that may still hold an unsealed batch at termination.
pub trait BatchSealer {
    /// Seal whatever is pending, ignoring open groups.
    ///
    /// Returns the sequence number of the sealed batch, if one was produced.
    fn seal_pending(&mut self) -> Option<u64>;
}
