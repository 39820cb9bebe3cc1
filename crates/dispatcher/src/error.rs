//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Consumer creation error
    #[error("failed to create consumer '{name}': {message}")]
    ConsumerCreation { name: String, message: String },

    /// Push after the queue started stopping - batch dropped
    #[error("queue for consumer '{consumer}' is stopping, batch {seq} dropped")]
    QueueStopped { consumer: String, seq: u64 },

    /// Worker thread could not be started
    #[error("failed to spawn worker '{worker}': {source}")]
    WorkerSpawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread died outside the consume loop
    #[error("worker '{worker}' could not be joined: {message}")]
    WorkerJoin { worker: String, message: String },

    /// Workers still running when the drain deadline passed
    #[error("drain timed out after {waited_ms}ms, workers still running: {workers:?}")]
    DrainTimeout { waited_ms: u64, workers: Vec<String> },
}

impl DispatcherError {
    /// Create a consumer creation error
    pub fn consumer_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a worker join error
    pub fn worker_join(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerJoin {
            worker: worker.into(),
            message: message.into(),
        }
    }
}
