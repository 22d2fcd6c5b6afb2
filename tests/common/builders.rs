//! Test data builders for source files, target tables and configuration.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use txn_merge_loader::config::EtlConfig;
use txn_merge_loader::load::{TableDescription, TargetColumn};
use txn_merge_loader::orchestration::RetryPolicy;

pub const TARGET_TABLE: &str = "forex.customer_transactions";
pub const PRIMARY_KEY: &str = "transaction_id";

/// Builder for delimited source files
pub struct SourceFileBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    delimiter: char,
}

impl SourceFileBuilder {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            delimiter: ',',
        }
    }

    /// The customer transactions layout with `count` generated rows keyed 1..=count
    pub fn transactions(count: usize) -> Self {
        (1..=count).fold(
            Self::new(&["transaction_id", "customer", "amount", "currency"]),
            |builder, id| {
                let key = id.to_string();
                let customer = format!("customer_{id}");
                let amount = format!("{}.{:02}", id * 10, id % 100);
                builder.with_row(&[key.as_str(), customer.as_str(), amount.as_str(), "EUR"])
            },
        )
    }

    pub fn with_row(mut self, row: &[&str]) -> Self {
        self.rows.push(row.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn write_to(&self, path: &Path) -> PathBuf {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter as u8)
            .from_path(path)
            .expect("create source file");
        writer.write_record(&self.header).expect("write header");
        for row in &self.rows {
            writer.write_record(row).expect("write row");
        }
        writer.flush().expect("flush source file");
        path.to_path_buf()
    }
}

/// Write a partition artifact directly, bypassing the partitioner
pub fn write_artifact(dir: &Path, index: usize, contents: &str) -> PathBuf {
    let path = dir.join(format!("customer_transactions__chunk_{index}.csv"));
    std::fs::write(&path, contents).expect("write artifact");
    path
}

pub fn transactions_table() -> TableDescription {
    TableDescription::new(vec![
        TargetColumn::new("transaction_id", "bigint"),
        TargetColumn::new("customer", "text"),
        TargetColumn::new("amount", "numeric(12,2)"),
        TargetColumn::new("currency", "text"),
        TargetColumn::new("load_timestamp", "timestamp with time zone"),
    ])
}

/// Configuration rooted in `dir` with millisecond retry delays
pub fn test_config(dir: &Path, chunk_size: usize) -> EtlConfig {
    let mut config = EtlConfig::default();
    config.source.path = dir.join("customer_transactions.csv");
    config.source.temp_dir = dir.join("temp_chunks");
    config.source.chunk_size = chunk_size;
    config.execution.max_concurrent_loads = 4;
    config.retry.max_retries = 2;
    config.retry.retry_delay_seconds = 0;
    config.retry.max_retry_delay_seconds = 0;
    config
}

pub fn fast_retry_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

/// Files left in a directory, sorted by name
pub fn remaining_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
