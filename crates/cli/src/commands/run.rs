//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::PipelineBlueprint;
use std::io::BufReader;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig, StopCause};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        capacity = blueprint.batching.capacity,
        consumers = blueprint.consumers.len(),
        drain_timeout_ms = ?blueprint.shutdown.drain_timeout_ms,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        buffer_size: args.buffer_size,
    });

    let stats = pipeline
        .run(BufReader::new(std::io::stdin()), setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        cause = ?stats.cause,
        lines = stats.accumulator.lines,
        batches = stats.accumulator.batches_sealed,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    if stats.cause == StopCause::Signal {
        warn!("Stopped by signal; all sealed batches were drained");
    }

    if args.stats {
        stats.print_summary();
    }

    Ok(())
}

/// Build the blueprint from `--config` (or the default wiring) plus CLI overrides
pub(crate) fn load_blueprint(args: &RunArgs) -> Result<PipelineBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            let capacity = args.capacity.ok_or(CliError::MissingCapacity)?;
            PipelineBlueprint::default_for(capacity)
        }
    };

    // Apply CLI overrides
    if let Some(capacity) = args.capacity {
        blueprint.batching.capacity = capacity;
    }
    if let Some(ms) = args.drain_timeout_ms {
        blueprint.shutdown.drain_timeout_ms = Some(ms);
    }

    ConfigLoader::validate(&blueprint).context("Invalid configuration")?;
    Ok(blueprint)
}

/// Resolve on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
