//! BatchConsumer trait - Dispatcher output interface
//!
//! Defines the abstract interface for consumers.

use crate::{Batch, ContractError};

/// Batch output trait
///
/// All consumer implementations must implement this trait. A consumer is
/// shared by every worker thread of its pool, so `consume` takes `&self`
/// and implementations synchronize any internal state themselves.
pub trait BatchConsumer: Send + Sync {
    /// Consumer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Handle one sealed batch
    ///
    /// # Errors
    /// Returns consume error (should include context). Errors stay inside
    /// the worker loop; they never reach the producer.
    fn consume(&self, batch: &Batch) -> Result<(), ContractError>;

    /// Release resources after the last batch was consumed
    fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
