//! # ETL Pipeline CLI
//!
//! Runs the hourly customer transactions pipeline, or one of its stages on its own.
//! An external scheduler can call `extract` once, fan the printed handles out to
//! `load --partition <path>` invocations, and trigger the transform separately.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use txn_merge_loader::config::ConfigManager;
use txn_merge_loader::database::DatabaseConnection;
use txn_merge_loader::extract::{PartitionHandle, Partitioner};
use txn_merge_loader::load::{LoaderOptions, PgTargetStore, UpsertLoader};
use txn_merge_loader::logging;
use txn_merge_loader::orchestration::{EtlPipeline, LocalTaskRunner, RetryPolicy};
use txn_merge_loader::transform::{CommandTransform, TransformTrigger};

#[derive(Parser)]
#[command(name = "etl-pipeline")]
#[command(about = "Chunked extract and idempotent merge load")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON by extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, load every partition, then trigger the transform
    Run,

    /// Partition the source and print one JSON handle per line
    Extract,

    /// Merge a single partition artifact into the target table
    Load {
        /// Artifact path, e.g. data/temp_chunks/customer_transactions__chunk_1.csv
        #[arg(short, long)]
        partition: PathBuf,
    },

    /// Run only the downstream transform
    Transform,

    /// Load and validate the configuration, then print it with secrets masked
    ValidateConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };
    logging::init_tracing_with_level(level);

    if let Err(e) = execute(cli).await {
        error!(error = %format!("{e:#}"), "etl-pipeline failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let manager = ConfigManager::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    let config = manager.config().clone();

    match cli.command {
        Commands::ValidateConfig => {
            println!("environment: {}", manager.environment());
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        }
        Commands::Extract => {
            let partitioner = Partitioner::from_config(&config.source)?;
            let source = config.source.path.clone();
            let chunk_size = config.source.chunk_size;
            let handles =
                tokio::task::spawn_blocking(move || partitioner.partition(&source, chunk_size))
                    .await??;
            for handle in &handles {
                println!("{}", serde_json::to_string(handle)?);
            }
        }
        Commands::Load { partition } => {
            let handle = PartitionHandle::from_path(partition)?;
            let db = DatabaseConnection::connect(&config.database).await?;
            let loader = UpsertLoader::new(
                PgTargetStore::new(db.pool().clone()),
                LoaderOptions::from_config(&config)?,
            );
            let result = loader
                .load(&handle, &config.load.target_table, &config.load.primary_key)
                .await;
            db.close().await;
            result.with_context(|| format!("loading {}", handle.path.display()))?;
        }
        Commands::Transform => {
            let report = CommandTransform::from_config(&config.transform).trigger().await?;
            print!("{}", report.stdout);
        }
        Commands::Run => {
            let db = DatabaseConnection::connect(&config.database).await?;
            let runner = LocalTaskRunner::new(
                config.execution.max_concurrent_loads,
                RetryPolicy::from_config(&config.retry),
            );
            let transform_enabled = config.transform.enabled;
            let transform = Arc::new(CommandTransform::from_config(&config.transform));

            let mut pipeline =
                EtlPipeline::new(config, PgTargetStore::new(db.pool().clone()), runner)?;
            if transform_enabled {
                pipeline = pipeline.with_transform(transform);
            }

            let result = pipeline.run().await;
            db.close().await;
            let report = result?;
            info!(run_id = %report.run_id, "Run finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
