//! LogSink - logs batch summary via tracing

use contracts::{Batch, BatchConsumer, ContractError};
use tracing::{info, instrument};

/// Sink that logs batch summaries for headless runs
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &Batch) {
        info!(
            consumer = %self.name,
            seq = batch.seq(),
            size = batch.len(),
            created_at = %batch.created_at(),
            commands = %batch.commands().join(", "),
            "Batch received"
        );
    }
}

impl BatchConsumer for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_consume",
        skip(self, batch),
        fields(consumer = %self.name, seq = batch.seq())
    )]
    fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
        self.log_batch_summary(batch);
        Ok(())
    }

    fn close(&self) -> Result<(), ContractError> {
        info!(consumer = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_log_sink_consume() {
        let sink = LogSink::new("test_log");
        let batch = Batch::new(7, vec!["cmd".into()], Utc::now()).unwrap();

        assert!(sink.consume(&batch).is_ok());
        assert!(sink.close().is_ok());
    }
}
