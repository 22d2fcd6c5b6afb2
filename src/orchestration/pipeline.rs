//! # Pipeline Driver
//!
//! One run of the hourly pipeline: partition the source once, load every partition
//! as its own task, and trigger the downstream transform only when every load
//! succeeded. A failed load leaves its artifact on disk and fails the run, naming every
//! retained artifact in [`EtlError::PipelineFailed`]; artifacts
//! of the loads that did succeed are already gone, so a re-run only re-merges what
//! is left.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, Span};
use uuid::Uuid;

use super::runner::TaskRunner;
use crate::config::EtlConfig;
use crate::error::{EtlError, EtlResult};
use crate::extract::{PartitionHandle, Partitioner};
use crate::load::{LoaderOptions, TargetStore, UpsertLoader};
use crate::transform::{TransformReport, TransformTrigger};

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: PathBuf,
    pub target_table: String,
    pub partitions: usize,
    pub rows_loaded: usize,
    pub transform: Option<TransformReport>,
}

/// Result of loading one partition
#[derive(Debug)]
pub struct PartitionOutcome {
    pub partition: PartitionHandle,
    pub result: EtlResult<()>,
}

impl PartitionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct EtlPipeline<S, R> {
    config: Arc<EtlConfig>,
    partitioner: Arc<Partitioner>,
    loader: Arc<UpsertLoader<S>>,
    runner: R,
    transform: Option<Arc<dyn TransformTrigger>>,
}

impl<S, R> std::fmt::Debug for EtlPipeline<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtlPipeline")
            .field("source", &self.config.source.path)
            .field("target_table", &self.config.load.target_table)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl<S, R> EtlPipeline<S, R>
where
    S: TargetStore + 'static,
    R: TaskRunner,
{
    pub fn new(config: EtlConfig, store: S, runner: R) -> EtlResult<Self> {
        let partitioner = Partitioner::from_config(&config.source)?;
        let loader = UpsertLoader::new(store, LoaderOptions::from_config(&config)?);
        Ok(Self {
            config: Arc::new(config),
            partitioner: Arc::new(partitioner),
            loader: Arc::new(loader),
            runner,
            transform: None,
        })
    }

    pub fn with_transform(mut self, transform: Arc<dyn TransformTrigger>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Extract, load every partition, then transform.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> EtlResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();

        let partitions = self.extract().await?;
        let total = partitions.len();
        let rows_loaded: usize = partitions.iter().filter_map(|p| p.row_count).sum();

        let outcomes = self.load_partitions(partitions).await;
        let failures: Vec<&PartitionOutcome> =
            outcomes.iter().filter(|o| !o.is_success()).collect();

        if let Some(first) = failures.first() {
            for failure in &failures {
                if let Err(err) = &failure.result {
                    error!(
                        partition_index = failure.partition.index,
                        artifact = %failure.partition.path.display(),
                        error = %err,
                        "Partition did not load"
                    );
                }
            }
            let first_error = match &first.result {
                Err(err) => format!("{}: {err}", first.partition.path.display()),
                Ok(()) => String::new(),
            };
            error!(
                failed = failures.len(),
                total = total,
                "Skipping transform because not every partition loaded"
            );
            return Err(EtlError::PipelineFailed {
                failed: failures.len(),
                total,
                first_error,
                failed_artifacts: failures.iter().map(|f| f.partition.path.clone()).collect(),
            });
        }

        let transform = match &self.transform {
            Some(trigger) => Some(self.run_transform(Arc::clone(trigger)).await?),
            None => None,
        };

        let report = PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            source: self.config.source.path.clone(),
            target_table: self.config.load.target_table.clone(),
            partitions: total,
            rows_loaded,
            transform,
        };
        info!(
            partitions = report.partitions,
            rows_loaded = report.rows_loaded,
            transformed = report.transform.is_some(),
            "Pipeline run complete"
        );
        Ok(report)
    }

    /// Partition the configured source on a blocking thread.
    pub async fn extract(&self) -> EtlResult<Vec<PartitionHandle>> {
        let partitioner = Arc::clone(&self.partitioner);
        let source = self.config.source.path.clone();
        let chunk_size = self.config.source.chunk_size;

        self.runner
            .submit("extract", move || {
                let partitioner = Arc::clone(&partitioner);
                let source = source.clone();
                async move {
                    tokio::task::spawn_blocking(move || partitioner.partition(&source, chunk_size))
                        .await?
                }
            })
            .wait()
            .await
    }

    /// Load each partition as its own task and wait for all of them.
    ///
    /// Every partition is attempted regardless of how the others fare.
    pub async fn load_partitions(&self, partitions: Vec<PartitionHandle>) -> Vec<PartitionOutcome> {
        let target_table = self.config.load.target_table.clone();
        let primary_key = self.config.load.primary_key.clone();

        let submitted: Vec<_> = partitions
            .into_iter()
            .map(|partition| {
                let loader = Arc::clone(&self.loader);
                let target_table = target_table.clone();
                let primary_key = primary_key.clone();
                let task_partition = partition.clone();
                let handle = self.runner.submit(
                    format!("load_chunk_{}", partition.index),
                    move || {
                        let loader = Arc::clone(&loader);
                        let partition = task_partition.clone();
                        let target_table = target_table.clone();
                        let primary_key = primary_key.clone();
                        async move { loader.load(&partition, &target_table, &primary_key).await }
                    },
                );
                (partition, handle)
            })
            .collect();

        let (partitions, handles): (Vec<_>, Vec<_>) = submitted.into_iter().unzip();
        let results = join_all(handles.into_iter().map(|handle| handle.wait())).await;

        partitions
            .into_iter()
            .zip(results)
            .map(|(partition, result)| PartitionOutcome { partition, result })
            .collect()
    }

    async fn run_transform(&self, trigger: Arc<dyn TransformTrigger>) -> EtlResult<TransformReport> {
        self.runner
            .submit("transform", move || {
                let trigger = Arc::clone(&trigger);
                async move { trigger.trigger().await }
            })
            .wait()
            .await
    }
}
