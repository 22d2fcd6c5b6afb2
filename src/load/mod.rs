//! # Load
//!
//! Converts one partition artifact into a single `MERGE` against the target table
//! and removes the artifact once the statement has committed.
//!
//! ## Flow
//!
//! 1. [`reader`] reads the artifact, mapping configured null markers to `None`
//! 2. [`store::TargetStore::describe_table`] fetches the target's columns and types
//! 3. [`merge::MergeStatement::build`] validates the partition and renders the statement
//! 4. [`store::TargetStore::execute_merge`] runs it in one round trip
//! 5. the artifact is deleted; on any failure before this point it stays on disk
//!
//! ```rust,no_run
//! use txn_merge_loader::extract::PartitionHandle;
//! use txn_merge_loader::load::{LoaderOptions, PgTargetStore, UpsertLoader};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> txn_merge_loader::EtlResult<()> {
//! let loader = UpsertLoader::new(PgTargetStore::new(pool), LoaderOptions::default());
//! let handle = PartitionHandle::from_path("data/temp_chunks/customer_transactions__chunk_1.csv")?;
//! loader.load(&handle, "forex.customer_transactions", "transaction_id").await?;
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod merge;
pub mod reader;
pub mod store;

pub use loader::{LoaderOptions, UpsertLoader};
pub use merge::{MergeStatement, TableDescription, TableName, TargetColumn};
pub use reader::{read_partition, PartitionData};
pub use store::{PgTargetStore, TargetStore};
