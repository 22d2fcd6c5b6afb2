//! Partition artifact reader.
//!
//! A partition is bounded by the chunk size, so it is read fully into memory.
//! Configured null markers become `None`, which is distinct from every string,
//! including the empty one.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{EtlError, EtlResult};

/// Header and rows of one partition, in artifact order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl PartitionData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Read a partition artifact, mapping every field equal to one of `null_values`
/// to `None`.
pub fn read_partition(
    path: &Path,
    delimiter: u8,
    null_values: &[String],
) -> EtlResult<PartitionData> {
    let file = File::open(path).map_err(|e| EtlError::from_io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::from_csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    if columns.is_empty() {
        return Err(EtlError::InvalidInput(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut seen = HashSet::with_capacity(columns.len());
    if let Some(duplicate) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(EtlError::InvalidInput(format!(
            "{} declares column '{duplicate}' more than once",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EtlError::from_csv(path, e))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if null_values.iter().any(|marker| marker == field) {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(PartitionData { columns, rows })
}
