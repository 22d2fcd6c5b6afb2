#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Transaction Merge Loader
//!
//! Chunked extract and idempotent merge load for delimited transaction files.
//!
//! ## Overview
//!
//! A source file is split into bounded-size partition artifacts, and each artifact is
//! merged into a keyed target table with a single `MERGE` statement. Matching rows are
//! updated, new rows are inserted, and every touched row gets a fresh
//! `load_timestamp`. Loading the same partition twice leaves the data columns
//! unchanged. An artifact is deleted only after its merge has committed, so a failed
//! load can be inspected and re-run.
//!
//! ## Module Organization
//!
//! - [`extract`] - partitioner and partition handles
//! - [`load`] - upsert loader, merge statement construction, target store seam
//! - [`orchestration`] - task runner, retry policy, pipeline driver
//! - [`transform`] - downstream transform trigger (local or over ssh)
//! - [`database`] - target database connection pool
//! - [`config`] - configuration structs and layered loading
//! - [`error`] - structured error handling
//! - [`logging`] - tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use txn_merge_loader::config::ConfigManager;
//! use txn_merge_loader::database::DatabaseConnection;
//! use txn_merge_loader::load::PgTargetStore;
//! use txn_merge_loader::orchestration::{EtlPipeline, LocalTaskRunner, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let config = manager.config().clone();
//!
//! let db = DatabaseConnection::connect(&config.database).await?;
//! let runner = LocalTaskRunner::new(
//!     config.execution.max_concurrent_loads,
//!     RetryPolicy::from_config(&config.retry),
//! );
//! let pipeline = EtlPipeline::new(config, PgTargetStore::new(db.pool().clone()), runner)?;
//!
//! let report = pipeline.run().await?;
//! println!("{} partitions, {} rows", report.partitions, report.rows_loaded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                                # Unit and in-memory integration tests
//! cargo test --features test-database      # Adds PostgreSQL tests (needs DATABASE_URL)
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod orchestration;
pub mod transform;

pub use config::{ConfigManager, EtlConfig};
pub use error::{EtlError, EtlResult};
pub use extract::{PartitionHandle, Partitioner};
pub use load::{PgTargetStore, TargetStore, UpsertLoader};
pub use orchestration::{EtlPipeline, LocalTaskRunner, PipelineReport, RetryPolicy};
pub use transform::{CommandTransform, TransformReport, TransformTrigger};
