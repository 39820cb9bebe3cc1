//! Pipeline orchestrator - stdin reader, batcher, dispatcher, shutdown.
//!
//! Lines are read on a dedicated thread and handed to the producer task over a
//! channel; the producer is the only owner of the accumulator. Shutdown runs
//! on a blocking task because draining joins worker threads.

use std::future::Future;
use std::io::{self, BufRead};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use batcher::BatchAccumulator;
use contracts::PipelineBlueprint;
use dispatcher::DispatcherBuilder;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{PipelineStats, StopCause};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated blueprint
    pub blueprint: PipelineBlueprint,

    /// Channel buffer size between the reader thread and the producer
    pub buffer_size: usize,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until end of input or until `shutdown` resolves, then drain.
    pub async fn run<R, S>(self, input: R, shutdown: S) -> Result<PipelineStats>
    where
        R: BufRead + Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        let dispatcher = DispatcherBuilder::new(blueprint.consumers.clone())
            .with_drain_timeout(blueprint.shutdown.drain_timeout())
            .build()
            .context("Failed to create dispatcher")?;
        let (bus, coordinator) = dispatcher.split();
        let trigger = coordinator.trigger();

        let mut accumulator = BatchAccumulator::from_config(&blueprint.batching, bus)
            .context("Invalid batching configuration")?;
        info!(
            capacity = accumulator.capacity().get(),
            consumers = ?accumulator.publisher().consumers(),
            "Batcher ready"
        );

        // Termination notifier fires the coordinator's trigger
        let signal_trigger = trigger.clone();
        let signal_task = tokio::spawn(async move {
            shutdown.await;
            if signal_trigger.fire() {
                warn!("Termination requested, draining...");
            }
        });

        let (line_tx, mut line_rx) = mpsc::channel(self.config.buffer_size.max(1));
        spawn_reader(input, line_tx)?;

        let cause = loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some(Ok(line)) => accumulator.observe(&line),
                    Some(Err(e)) => {
                        error!(error = %e, "Input read failed, treating as end of input");
                        break StopCause::EndOfInput;
                    }
                    None => break StopCause::EndOfInput,
                },
                _ = trigger.fired() => break StopCause::Signal,
            }
        };
        signal_task.abort();

        // Lines the reader handed over before the stop are still input
        let buffered = drain_buffered(&mut line_rx, |line| accumulator.observe(line));
        if buffered > 0 {
            debug!(lines = buffered, "Observed buffered lines after stop");
        }
        // A reader still blocked on input exits on its next send
        drop(line_rx);

        // Shutdown
        info!(cause = ?cause, "Shutting down pipeline...");
        let (result, accumulator) = tokio::task::spawn_blocking(move || {
            let result = coordinator.shutdown(&mut accumulator);
            (result, accumulator)
        })
        .await
        .map_err(|e| CliError::shutdown(e.to_string()))?;

        let report = result
            .context("Graceful shutdown failed")?
            .ok_or_else(|| CliError::shutdown("shutdown was already performed"))?;

        let stats = PipelineStats {
            cause,
            duration: start_time.elapsed(),
            accumulator: accumulator.stats(),
            published: accumulator.publisher().published(),
            rejected: accumulator.publisher().rejected(),
            batch_metrics: accumulator.metrics_summary(),
            shutdown: report,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            batches = stats.published,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Read lines on a named std thread; blocking reads never stall the runtime
fn spawn_reader<R>(mut input: R, tx: mpsc::Sender<io::Result<String>>) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || {
            let mut count: u64 = 0;
            let mut buf = Vec::new();
            loop {
                let line = read_line_lossy(&mut input, &mut buf);
                let stop = !matches!(line, Ok(Some(_)));
                let sent = match line {
                    Ok(Some(line)) => tx.blocking_send(Ok(line)),
                    Ok(None) => break,
                    Err(e) => tx.blocking_send(Err(e)),
                };
                if sent.is_err() || stop {
                    break;
                }
                count += 1;
            }
            debug!(lines = count, "Input reader finished");
        })
        .map_err(|e| CliError::input(e.to_string()))?;
    Ok(())
}

/// Next line without its `\n` / `\r\n`; invalid UTF-8 is replaced, not rejected.
///
/// `Ok(None)` at end of input.
fn read_line_lossy<R: BufRead>(input: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if input.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Close the channel and hand every line already in it to `observe`
fn drain_buffered<F>(rx: &mut mpsc::Receiver<io::Result<String>>, mut observe: F) -> u64
where
    F: FnMut(&str),
{
    rx.close();
    let mut count = 0;
    while let Ok(line) = rx.try_recv() {
        match line {
            Ok(line) => {
                observe(&line);
                count += 1;
            }
            Err(e) => {
                error!(error = %e, "Input read failed, treating as end of input");
                break;
            }
        }
    }
    count
}
