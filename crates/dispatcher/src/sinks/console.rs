//! ConsoleSink - prints rendered batches to stdout

use contracts::{Batch, BatchConsumer, ContractError};
use std::io::{self, Write};
use tracing::{debug, instrument};

/// Sink that prints `bulk: ...` lines to stdout
///
/// The whole line is written under one stdout lock, so workers of the same
/// pool never interleave within a line.
pub struct ConsoleSink {
    name: String,
}

impl ConsoleSink {
    /// Create a new ConsoleSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn print(&self, batch: &Batch) -> io::Result<()> {
        let line = batch.render();
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

impl BatchConsumer for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "console_sink_consume",
        skip(self, batch),
        fields(consumer = %self.name, seq = batch.seq())
    )]
    fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
        self.print(batch)
            .map_err(|e| ContractError::consumer_write(&self.name, batch.seq(), e.to_string()))
    }

    fn close(&self) -> Result<(), ContractError> {
        debug!(consumer = %self.name, "ConsoleSink closed");
        Ok(())
    }
}
