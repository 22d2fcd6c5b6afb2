//! # Orchestration
//!
//! Drives the extract and load engine as a task graph: one extract task, one load
//! task per partition, then one transform task. The engine itself knows nothing of
//! this module; any scheduler offering submit, await and a retry policy can take
//! the place of [`LocalTaskRunner`].
//!
//! - [`backoff`] - retry delays between attempts of one task
//! - [`runner`] - the [`TaskRunner`] capability set and its in-process implementation
//! - [`pipeline`] - [`EtlPipeline`], a full run with its [`PipelineReport`]

pub mod backoff;
pub mod pipeline;
pub mod runner;

pub use backoff::RetryPolicy;
pub use pipeline::{EtlPipeline, PartitionOutcome, PipelineReport};
pub use runner::{LocalTaskRunner, TaskHandle, TaskRunner};
