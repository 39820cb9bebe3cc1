//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ConsumerType, PipelineBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    capacity: usize,
    group_start: String,
    group_end: String,
    drain_timeout_ms: Option<u64>,
    consumers: Vec<ConsumerSummary>,
}

#[derive(Serialize)]
struct ConsumerSummary {
    name: String,
    consumer_type: ConsumerType,
    workers: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &PipelineBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        capacity: blueprint.batching.capacity,
        group_start: blueprint.batching.group_start.clone(),
        group_end: blueprint.batching.group_end.clone(),
        drain_timeout_ms: blueprint.shutdown.drain_timeout_ms,
        consumers: blueprint
            .consumers
            .iter()
            .map(|c| ConsumerSummary {
                name: c.name.clone(),
                consumer_type: c.consumer_type,
                workers: c.resolved_worker_names(),
            })
            .collect(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for consumer in &blueprint.consumers {
        if consumer.workers > 1 {
            warnings.push(format!(
                "Consumer '{}' has {} workers - its batches may be consumed out of order",
                consumer.name, consumer.workers
            ));
        }
        if consumer.consumer_type == ConsumerType::File
            && !consumer.params.contains_key("output_dir")
        {
            warnings.push(format!(
                "Consumer '{}' has no output_dir - writing to the working directory",
                consumer.name
            ));
        }
    }

    let console_count = blueprint
        .consumers
        .iter()
        .filter(|c| c.consumer_type == ConsumerType::Console)
        .count();
    if console_count > 1 {
        warnings.push(format!(
            "{console_count} console consumers - every batch will be printed {console_count} times"
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Capacity: {}", summary.capacity);
            println!("  Group markers: {} {}", summary.group_start, summary.group_end);
            match summary.drain_timeout_ms {
                Some(ms) => println!("  Drain timeout: {}ms", ms),
                None => println!("  Drain timeout: unbounded"),
            }
            println!("  Consumers:");
            for consumer in &summary.consumers {
                println!(
                    "    - {} ({:?}): {}",
                    consumer.name,
                    consumer.consumer_type,
                    consumer.workers.join(", ")
                );
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
