//! Batch accumulator: the grouping state machine.
//!
//! Two competing policies decide when pending commands become a `Batch`:
//! - size: `capacity` commands outside any group
//! - explicit groups: a start/end marker pair, possibly nested
//!
//! Driven by a single producer thread, so no internal locking.

use std::mem;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use contracts::{
    Batch, BatchPublisher, BatchSealer, BatchingConfig, Command, ContractError, GroupMarkers,
    SealReason,
};
use observability::{record_batch_sealed, record_line, BatchMetricsAggregator, MetricsSummary};
use tracing::{debug, instrument, warn};

use crate::line::Line;

/// Producer-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Raw lines observed (commands and markers)
    pub lines: u64,
    /// Commands added
    pub commands: u64,
    /// Group-start markers seen
    pub groups_opened: u64,
    /// Group-end markers dropped because no group was open
    pub unmatched_group_ends: u64,
    /// Batches sealed and published
    pub batches_sealed: u64,
}

/// Accumulates commands and seals them into batches
#[derive(Debug)]
pub struct BatchAccumulator<P> {
    /// Size trigger (authoritative only at depth 0)
    capacity: NonZeroUsize,
    /// Group markers
    markers: GroupMarkers,
    /// Commands since the previous seal
    pending: Vec<Command>,
    /// Time the first pending command was added
    created_at: Option<DateTime<Utc>>,
    /// Open group nesting depth
    depth: usize,
    /// Sequence number of the next sealed batch
    next_seq: u64,
    /// Where sealed batches go
    publisher: P,
    stats: AccumulatorStats,
    aggregator: BatchMetricsAggregator,
}

impl<P: BatchPublisher> BatchAccumulator<P> {
    /// Create an accumulator with the default `{` / `}` markers
    pub fn new(capacity: NonZeroUsize, publisher: P) -> Self {
        Self {
            capacity,
            markers: GroupMarkers::default(),
            pending: Vec::with_capacity(capacity.get()),
            created_at: None,
            depth: 0,
            next_seq: 1,
            publisher,
            stats: AccumulatorStats::default(),
            aggregator: BatchMetricsAggregator::new(),
        }
    }

    /// Create from batching configuration
    pub fn from_config(config: &BatchingConfig, publisher: P) -> Result<Self, ContractError> {
        let capacity = config.non_zero_capacity()?;
        Ok(Self::new(capacity, publisher).with_markers(config.markers()))
    }

    /// Replace the group markers
    pub fn with_markers(mut self, markers: GroupMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Route one raw input line, then apply the size check
    #[instrument(level = "trace", name = "accumulator_observe", skip(self, raw))]
    pub fn observe(&mut self, raw: &str) {
        self.stats.lines += 1;

        let line = Line::classify(raw, &self.markers);
        record_line(line.kind());

        match line {
            Line::GroupStart => self.open_group(),
            Line::GroupEnd => self.close_group(),
            Line::Command(command) => self.add(command.to_string()),
        }

        if self.depth == 0 && self.pending.len() >= self.capacity.get() {
            self.seal(SealReason::Capacity);
        }
    }

    /// Append a command; the first one after a seal stamps `created_at`
    pub fn add(&mut self, command: Command) {
        if self.pending.is_empty() {
            self.created_at = Some(Utc::now());
        }
        self.pending.push(command);
        self.stats.commands += 1;
    }

    /// Open a group. Leaving depth 0 flushes the implicit batch first.
    pub fn open_group(&mut self) {
        if self.depth == 0 && !self.pending.is_empty() {
            self.seal(SealReason::GroupOpened);
        }
        self.depth += 1;
        self.stats.groups_opened += 1;
    }

    /// Close a group. Closing the outermost one seals.
    pub fn close_group(&mut self) {
        if self.depth == 0 {
            self.stats.unmatched_group_ends += 1;
            debug!("Unmatched group end ignored");
            return;
        }

        self.depth -= 1;
        if self.depth == 0 {
            self.seal(SealReason::GroupClosed);
        }
    }

    /// Seal pending commands into a batch and publish it.
    ///
    /// No-op on an empty accumulator. Returns the sealed batch's sequence number.
    pub fn seal(&mut self, reason: SealReason) -> Option<u64> {
        if self.pending.is_empty() {
            return None;
        }

        let commands = mem::replace(&mut self.pending, Vec::with_capacity(self.capacity.get()));
        let created_at = self.created_at.take().unwrap_or_else(Utc::now);
        let seq = self.next_seq;
        let batch = Batch::new(seq, commands, created_at)?;
        self.next_seq += 1;

        self.stats.batches_sealed += 1;
        self.aggregator.update(&batch, reason);
        record_batch_sealed(&batch, reason);
        debug!(seq, size = batch.len(), reason = %reason, "Batch sealed");

        self.publisher.publish(batch);
        Some(seq)
    }

    /// Pending command count
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn markers(&self) -> &GroupMarkers {
        &self.markers
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Batch size / seal reason summary
    pub fn metrics_summary(&self) -> MetricsSummary {
        self.aggregator.summary()
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<P: BatchPublisher> BatchSealer for BatchAccumulator<P> {
    fn seal_pending(&mut self) -> Option<u64> {
        if self.depth > 0 {
            warn!(
                depth = self.depth,
                pending = self.pending.len(),
                "Closing unterminated group on shutdown"
            );
            self.depth = 0;
        }
        self.seal(SealReason::Shutdown)
    }
}
