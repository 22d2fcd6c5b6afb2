mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use txn_merge_loader::extract::{Partitioner, PartitionerOptions};
use txn_merge_loader::load::{read_partition, LoaderOptions, UpsertLoader};

fn write_source(dir: &std::path::Path, rows: &[Vec<String>]) -> std::path::PathBuf {
    let builder = rows.iter().fold(
        SourceFileBuilder::new(&["transaction_id", "customer", "amount"]),
        |builder, row| builder.with_row(&row.iter().map(String::as_str).collect::<Vec<_>>()),
    );
    builder.write_to(&dir.join("customer_transactions.csv"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: partitions are an exact, order-preserving cover of the source
    #[test]
    fn partitions_cover_source_in_order(
        rows in source_rows_strategy(60),
        chunk_size in chunk_size_strategy(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), &rows);
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));

        let handles = partitioner.partition(&source, chunk_size).unwrap();

        prop_assert_eq!(handles.len(), rows.len().div_ceil(chunk_size));

        let mut seen = Vec::new();
        for (position, handle) in handles.iter().enumerate() {
            prop_assert_eq!(handle.index, position + 1);
            let data = read_partition(&handle.path, b',', &[]).unwrap();
            prop_assert_eq!(&data.columns, &vec!["transaction_id".to_string(), "customer".to_string(), "amount".to_string()]);
            prop_assert!(data.row_count() >= 1 && data.row_count() <= chunk_size);
            prop_assert_eq!(handle.row_count, Some(data.row_count()));
            seen.extend(data.rows.into_iter().map(|row| row.into_iter().map(Option::unwrap_or_default).collect::<Vec<_>>()));
        }
        prop_assert_eq!(seen, rows);
    }

    /// Property: loading every partition twice leaves the same data as loading once
    #[test]
    fn merging_twice_matches_merging_once(
        rows in source_rows_strategy(30),
        chunk_size in chunk_size_strategy(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), &rows);
        let partitioner = Partitioner::new(PartitionerOptions::new(dir.path().join("chunks")));
        let store = Arc::new(
            InMemoryTargetStore::new().with_table(TARGET_TABLE, transactions_table(), PRIMARY_KEY),
        );
        let loader = UpsertLoader::new(Arc::clone(&store), LoaderOptions::default());

        let load_all = || {
            let handles = partitioner.partition(&source, chunk_size).unwrap();
            tokio_test::block_on(async {
                for handle in &handles {
                    loader.load(handle, TARGET_TABLE, PRIMARY_KEY).await.unwrap();
                }
            });
        };

        load_all();
        let once: Vec<_> = store.rows(TARGET_TABLE).into_iter().map(|r| r.values).collect();
        load_all();
        let twice: Vec<_> = store.rows(TARGET_TABLE).into_iter().map(|r| r.values).collect();

        prop_assert_eq!(once.len(), rows.len());
        prop_assert_eq!(once, twice);
    }
}
