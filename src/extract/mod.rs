//! # Extract
//!
//! Turns one source file into an ordered list of bounded-size partition artifacts.
//! Each artifact repeats the source header, so a load worker can process it without
//! looking at the source or at any other partition.
//!
//! ```rust,no_run
//! use txn_merge_loader::extract::{Partitioner, PartitionerOptions};
//! use std::path::Path;
//!
//! # fn example() -> txn_merge_loader::EtlResult<()> {
//! let partitioner = Partitioner::new(PartitionerOptions::new("data/temp_chunks"));
//! let handles = partitioner.partition(Path::new("data/customer_transactions.csv"), 10)?;
//! for handle in &handles {
//!     println!("{} -> {}", handle.index, handle.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod handle;
pub mod partitioner;

pub use handle::{artifact_file_name, PartitionHandle};
pub use partitioner::{Partitioner, PartitionerOptions};
