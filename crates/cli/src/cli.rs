//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bulkmt - batch commands from stdin and fan them out to consumer thread pools
#[derive(Parser, Debug)]
#[command(
    name = "bulkmt",
    author,
    version,
    about = "Multi-threaded command batching pipeline",
    long_about = "Reads commands from stdin one per line and groups them into batches.\n\n\
                  A batch is sealed when it reaches CAPACITY commands, or spans an explicit\n\
                  `{` ... `}` group. Every batch is delivered to every configured consumer\n\
                  (console printer, file saver, log), each served by its own worker threads."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BULKMT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "BULKMT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the batching pipeline on stdin
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Commands per batch (overrides the configuration value)
    #[arg(env = "BULKMT_CAPACITY")]
    pub capacity: Option<usize>,

    /// Path to configuration file (TOML or JSON); default wiring is printer + saver
    #[arg(short, long, env = "BULKMT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bound the shutdown drain in milliseconds (default: wait for all workers)
    #[arg(long, env = "BULKMT_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "BULKMT_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Print per-thread statistics after shutdown
    #[arg(long)]
    pub stats: bool,

    /// Channel buffer size between the stdin reader and the batcher
    #[arg(long, default_value = "1024", env = "BULKMT_BUFFER_SIZE")]
    pub buffer_size: usize,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bulkmt.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
