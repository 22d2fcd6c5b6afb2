//! Streaming partitioner.
//!
//! Reads the source one record at a time and rolls over to a new artifact every
//! `chunk_size` records, so memory use is bounded by a single record regardless of
//! the source size.

use csv::{StringRecord, Writer};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::handle::{artifact_file_name, PartitionHandle};
use crate::config::SourceConfig;
use crate::constants::DEFAULT_ARTIFACT_EXTENSION;
use crate::error::{EtlError, EtlResult};

#[derive(Debug, Clone)]
pub struct PartitionerOptions {
    /// Directory receiving the artifacts, created when missing
    pub temp_dir: PathBuf,
    pub delimiter: u8,
}

impl PartitionerOptions {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Splits a delimited source file into independently loadable partitions
#[derive(Debug, Clone)]
pub struct Partitioner {
    options: PartitionerOptions,
}

/// Artifact currently being filled
struct OpenPartition {
    index: usize,
    path: PathBuf,
    writer: Writer<File>,
    rows: usize,
}

impl Partitioner {
    pub fn new(options: PartitionerOptions) -> Self {
        Self { options }
    }

    pub fn from_config(source: &SourceConfig) -> EtlResult<Self> {
        let delimiter = source.delimiter_byte()?;
        Ok(Self::new(
            PartitionerOptions::new(&source.temp_dir).with_delimiter(delimiter),
        ))
    }

    pub fn options(&self) -> &PartitionerOptions {
        &self.options
    }

    /// Split `source` into artifacts of at most `chunk_size` records each.
    ///
    /// Returns one handle per artifact, numbered from 1 in source order. On a
    /// storage failure the artifacts written so far are left on disk.
    #[instrument(skip(self), fields(temp_dir = %self.options.temp_dir.display()))]
    pub fn partition(&self, source: &Path, chunk_size: usize) -> EtlResult<Vec<PartitionHandle>> {
        if chunk_size == 0 {
            return Err(EtlError::InvalidInput(
                "chunk size must be a positive integer".to_string(),
            ));
        }

        let file = File::open(source).map_err(|e| EtlError::from_io(source, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let header = reader
            .headers()
            .map_err(|e| EtlError::from_csv(source, e))?
            .clone();
        if header.is_empty() {
            return Err(EtlError::InvalidInput(format!(
                "{} has no header row",
                source.display()
            )));
        }

        fs::create_dir_all(&self.options.temp_dir)
            .map_err(|e| EtlError::from_io(&self.options.temp_dir, e))?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                EtlError::InvalidInput(format!("{} has no file name", source.display()))
            })?;
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_ARTIFACT_EXTENSION.to_string());

        let mut handles = Vec::new();
        let mut current: Option<OpenPartition> = None;
        let mut record = StringRecord::new();

        while reader
            .read_record(&mut record)
            .map_err(|e| EtlError::from_csv(source, e))?
        {
            let mut partition = match current.take() {
                Some(partition) => partition,
                None => self.open_partition(&stem, handles.len() + 1, &extension, &header)?,
            };

            partition
                .writer
                .write_record(&record)
                .map_err(|e| EtlError::from_csv(&partition.path, e))?;
            partition.rows += 1;

            if partition.rows == chunk_size {
                handles.push(Self::close_partition(partition)?);
            } else {
                current = Some(partition);
            }
        }

        if let Some(last) = current.take() {
            handles.push(Self::close_partition(last)?);
        }

        info!(
            source = %source.display(),
            chunk_size = chunk_size,
            partitions = handles.len(),
            rows = handles.iter().filter_map(|h| h.row_count).sum::<usize>(),
            "Source partitioned"
        );

        Ok(handles)
    }

    fn open_partition(
        &self,
        stem: &str,
        index: usize,
        extension: &str,
        header: &StringRecord,
    ) -> EtlResult<OpenPartition> {
        let path = self
            .options
            .temp_dir
            .join(artifact_file_name(stem, index, extension));

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_path(&path)
            .map_err(|e| EtlError::from_csv(&path, e))?;
        writer
            .write_record(header)
            .map_err(|e| EtlError::from_csv(&path, e))?;

        Ok(OpenPartition {
            index,
            path,
            writer,
            rows: 0,
        })
    }

    fn close_partition(mut partition: OpenPartition) -> EtlResult<PartitionHandle> {
        partition
            .writer
            .flush()
            .map_err(|e| EtlError::from_io(&partition.path, e))?;

        debug!(
            partition_index = partition.index,
            path = %partition.path.display(),
            rows = partition.rows,
            "Partition artifact written"
        );

        Ok(PartitionHandle::new(
            partition.index,
            partition.path,
            partition.rows,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_partition_rolls_over_at_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(
            dir.path(),
            "customer_transactions.csv",
            "transaction_id,amount\n1,10.5\n2,20\n3,30\n4,40\n5,50\n",
        );
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        let handles = partitioner.partition(&source, 2).unwrap();

        assert_eq!(handles.len(), 3);
        assert_eq!(
            handles.iter().map(|h| h.row_count).collect::<Vec<_>>(),
            vec![Some(2), Some(2), Some(1)]
        );
        assert_eq!(
            handles[0].path,
            dir.path()
                .join("chunks")
                .join("customer_transactions__chunk_1.csv")
        );
        assert_eq!(
            fs::read_to_string(&handles[2].path).unwrap(),
            "transaction_id,amount\n5,50\n"
        );
    }

    #[test]
    fn test_zero_chunk_size_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "t.csv", "id\n1\n");
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        assert!(matches!(
            partitioner.partition(&source, 0),
            Err(EtlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        assert!(matches!(
            partitioner.partition(&dir.path().join("absent.csv"), 10),
            Err(EtlError::NotFound(_))
        ));
    }

    #[test]
    fn test_header_only_source_yields_no_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "t.csv", "transaction_id,amount\n");
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        assert!(partitioner.partition(&source, 10).unwrap().is_empty());
        assert!(dir.path().join("chunks").is_dir());
    }

    #[test]
    fn test_empty_source_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "t.csv", "");
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        assert!(matches!(
            partitioner.partition(&source, 10),
            Err(EtlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ragged_record_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "t.csv", "id,amount\n1,2\n3\n");
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        let err = partitioner.partition(&source, 10).unwrap_err();
        assert!(matches!(err, EtlError::InvalidInput(ref msg) if msg.contains("line")));
    }

    #[test]
    fn test_custom_delimiter_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), "rates.tsv", "id\tnote\n1\ta,b\n");
        let partitioner = Partitioner::new(
            PartitionerOptions::new(dir.path().join("chunks")).with_delimiter(b'\t'),
        );

        let handles = partitioner.partition(&source, 10).unwrap();
        assert!(handles[0].path.ends_with("rates__chunk_1.tsv"));
        assert_eq!(
            fs::read_to_string(&handles[0].path).unwrap(),
            "id\tnote\n1\ta,b\n"
        );
    }
}
