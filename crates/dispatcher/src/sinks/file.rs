//! FileSink - writes each batch to its own log file

use contracts::{Batch, BatchConsumer, ContractError};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Directory the batch files are written to
    pub output_dir: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let output_dir = params
            .get("output_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self { output_dir }
    }
}

/// Sink that saves every batch to `bulk<unix_secs>_<worker>_<seq>.log`
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
}

impl FileSink {
    /// Create a new FileSink, creating the output directory if needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.output_dir)?;

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// File path for a batch consumed on the current thread
    pub fn path_for(&self, batch: &Batch) -> PathBuf {
        let worker = thread::current()
            .name()
            .map(sanitize)
            .unwrap_or_else(|| "worker".to_string());
        let file_name = format!(
            "bulk{}_{}_{}.log",
            batch.created_at().timestamp(),
            worker,
            batch.seq()
        );
        self.config.output_dir.join(file_name)
    }

    fn write_batch_to_disk(&self, batch: &Batch) -> std::io::Result<PathBuf> {
        let path = self.path_for(batch);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(batch.render().as_bytes())?;
        file.flush()?;
        Ok(path)
    }
}

// Thread names come from config; keep them path-safe
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl BatchConsumer for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_consume",
        skip(self, batch),
        fields(consumer = %self.name, seq = batch.seq())
    )]
    fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
        match self.write_batch_to_disk(batch) {
            Ok(path) => {
                debug!(consumer = %self.name, path = %path.display(), "Batch saved");
                Ok(())
            }
            Err(e) => {
                error!(consumer = %self.name, seq = batch.seq(), error = %e, "Write failed");
                Err(ContractError::consumer_write(
                    &self.name,
                    batch.seq(),
                    e.to_string(),
                ))
            }
        }
    }

    fn close(&self) -> Result<(), ContractError> {
        debug!(consumer = %self.name, "FileSink closed");
        Ok(())
    }
}
