//! Pipeline statistics and end-of-run report.

use std::fmt::Write as _;
use std::time::Duration;

use batcher::AccumulatorStats;
use dispatcher::ShutdownReport;
use observability::MetricsSummary;

/// Why the producer stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    EndOfInput,
    Signal,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub cause: StopCause,

    /// Total duration of the pipeline run, drain included
    pub duration: Duration,

    /// Producer-side counters
    pub accumulator: AccumulatorStats,

    /// Batches handed to the bus
    pub published: u64,

    /// Pushes refused by stopped queues
    pub rejected: u64,

    /// Batch size / seal reason summary
    pub batch_metrics: MetricsSummary,

    /// Per-worker counters collected at shutdown
    pub shutdown: ShutdownReport,
}

impl PipelineStats {
    /// One line per thread: the producer, then every worker
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let acc = &self.accumulator;
        let _ = writeln!(
            out,
            "thread main: {} lines, {} commands, {} bulks",
            acc.lines, acc.commands, acc.batches_sealed
        );
        for (worker, snapshot) in self.shutdown.workers() {
            let _ = writeln!(
                out,
                "thread {}: {} commands, {} bulks",
                worker, snapshot.commands, snapshot.batches
            );
        }
        out
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        print!("{}", self.render_summary());

        println!("\nRun");
        println!("   ├─ Stopped by: {:?}", self.cause);
        println!("   ├─ Duration: {:.3}s", self.duration.as_secs_f64());
        println!("   ├─ Drain: {:.3}s", self.shutdown.elapsed.as_secs_f64());
        println!("   ├─ Groups opened: {}", self.accumulator.groups_opened);
        println!(
            "   ├─ Unmatched group ends: {}",
            self.accumulator.unmatched_group_ends
        );
        println!("   └─ Rejected pushes: {}", self.rejected);

        println!();
        print!("{}", self.batch_metrics);

        let failures: u64 = self.shutdown.workers().map(|(_, s)| s.failures).sum();
        if failures > 0 {
            println!("\n⚠ Consumer failures: {}", failures);
        }
        println!();
    }
}
