//! Partition handles and artifact naming.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::CHUNK_NAME_SEPARATOR;
use crate::error::{EtlError, EtlResult};

/// Location of one materialized partition.
///
/// Handles serialize to JSON so an external scheduler can hand them from the
/// extract task to the load tasks across process boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionHandle {
    /// 1-based position of the partition in source order
    pub index: usize,
    pub path: PathBuf,
    /// Data rows in the artifact, known when the partitioner produced the handle
    pub row_count: Option<usize>,
}

impl PartitionHandle {
    pub fn new(index: usize, path: PathBuf, row_count: usize) -> Self {
        Self {
            index,
            path,
            row_count: Some(row_count),
        }
    }

    /// Recover a handle from a bare artifact path such as
    /// `temp_chunks/customer_transactions__chunk_3.csv`.
    pub fn from_path(path: impl Into<PathBuf>) -> EtlResult<Self> {
        let path = path.into();
        let index = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit_once(CHUNK_NAME_SEPARATOR))
            .and_then(|(_, index)| index.parse::<usize>().ok())
            .filter(|index| *index > 0)
            .ok_or_else(|| {
                EtlError::InvalidInput(format!(
                    "{} is not a partition artifact (expected <stem>{CHUNK_NAME_SEPARATOR}<N>.<ext>)",
                    path.display()
                ))
            })?;

        Ok(Self {
            index,
            path,
            row_count: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// `<stem>__chunk_<index>.<extension>`
pub fn artifact_file_name(stem: &str, index: usize, extension: &str) -> String {
    format!("{stem}{CHUNK_NAME_SEPARATOR}{index}.{extension}")
}
