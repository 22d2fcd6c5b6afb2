//! Upsert loader: one partition in, one MERGE out.

use tracing::{error, info, instrument, warn};

use super::merge::{MergeStatement, TableName};
use super::reader::read_partition;
use super::store::TargetStore;
use crate::config::EtlConfig;
use crate::constants::defaults;
use crate::error::{EtlError, EtlResult};
use crate::extract::PartitionHandle;

/// How partition artifacts are parsed
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub delimiter: u8,
    /// Field values read as SQL NULL
    pub null_values: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_values: defaults::null_values(),
        }
    }
}

impl LoaderOptions {
    pub fn from_config(config: &EtlConfig) -> EtlResult<Self> {
        Ok(Self {
            delimiter: config.source.delimiter_byte()?,
            null_values: config.load.null_values.clone(),
        })
    }
}

/// Loads partitions into a target table through a [`TargetStore`].
///
/// Holds no per-call state: any number of `load` calls for distinct partitions may
/// run concurrently on one loader.
#[derive(Debug)]
pub struct UpsertLoader<S> {
    store: S,
    options: LoaderOptions,
}

impl<S: TargetStore> UpsertLoader<S> {
    pub fn new(store: S, options: LoaderOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merge the rows of `partition` into `target_table`, keyed on `primary_key`,
    /// then delete the artifact.
    ///
    /// On any error the artifact is left untouched so the call can be inspected
    /// and re-run; re-running is safe because the merge is idempotent on data columns.
    #[instrument(
        skip(self, partition),
        fields(partition_index = partition.index, artifact = %partition.path.display())
    )]
    pub async fn load(
        &self,
        partition: &PartitionHandle,
        target_table: &str,
        primary_key: &str,
    ) -> EtlResult<()> {
        match self.merge_partition(partition, target_table, primary_key).await {
            Ok(rows) => {
                self.discard_artifact(partition).await?;
                info!(
                    target_table = %target_table,
                    rows = rows,
                    "Partition merged and artifact removed"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    target_table = %target_table,
                    error = %err,
                    "Partition load failed; artifact retained for inspection"
                );
                Err(err)
            }
        }
    }

    async fn merge_partition(
        &self,
        partition: &PartitionHandle,
        target_table: &str,
        primary_key: &str,
    ) -> EtlResult<usize> {
        let table = TableName::parse(target_table)?;
        let primary_key = primary_key.trim();
        if primary_key.is_empty() {
            return Err(EtlError::InvalidInput(
                "primary key column name is empty".to_string(),
            ));
        }

        let data = read_partition(
            partition.path(),
            self.options.delimiter,
            &self.options.null_values,
        )?;

        if data.is_empty() {
            warn!("Partition has a header but no rows; nothing to merge");
            return Ok(0);
        }

        let description = self.store.describe_table(&table).await?;
        let statement = MergeStatement::build(&table, &description, data, primary_key)?;

        let merged = self.store.execute_merge(&statement).await?;
        info!(
            table = %table,
            rows = statement.row_count(),
            rows_affected = merged,
            parameters = statement.parameter_count(),
            "Merge statement executed"
        );

        Ok(statement.row_count())
    }

    async fn discard_artifact(&self, partition: &PartitionHandle) -> EtlResult<()> {
        match tokio::fs::remove_file(partition.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Artifact already removed after successful merge");
                Ok(())
            }
            Err(e) => Err(EtlError::from_io(partition.path(), e)),
        }
    }
}
