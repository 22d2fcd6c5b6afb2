//! # Pipeline Configuration
//!
//! Explicit configuration structs handed to the partitioner, the loader and the
//! pipeline driver. Nothing in the core resolves connection identifiers, table names
//! or file paths on its own; they all arrive through [`EtlConfig`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use txn_merge_loader::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some(std::path::Path::new("config/etl.toml")))?;
//! let chunk_size = manager.config().source.chunk_size;
//! let table = &manager.config().load.target_table;
//! # Ok(())
//! # }
//! ```
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! hourly customer transactions setup. Environment variables of the form
//! `ETL__<SECTION>__<KEY>` override file values.

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::defaults;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Source file and partitioning settings
    pub source: SourceConfig,

    /// Merge target settings
    pub load: LoadConfig,

    /// Target store connection settings
    pub database: DatabaseConfig,

    /// Fan-out settings for the in-process runner
    pub execution: ExecutionConfig,

    /// Retry policy applied per task invocation
    pub retry: RetryConfig,

    /// Downstream transform trigger
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Single-byte field delimiter
    pub delimiter: String,
    /// Maximum number of records per partition
    pub chunk_size: usize,
    /// Directory holding partition artifacts, created on demand
    pub temp_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::SOURCE_PATH),
            delimiter: defaults::DELIMITER.to_string(),
            chunk_size: defaults::CHUNK_SIZE,
            temp_dir: PathBuf::from(defaults::TEMP_DIR),
        }
    }
}

impl SourceConfig {
    /// The delimiter as the byte the CSV reader and writer expect.
    pub fn delimiter_byte(&self) -> ConfigResult<u8> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ConfigurationError::invalid_value(
                "source.delimiter",
                self.delimiter.clone(),
                "delimiter must be exactly one ASCII character",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// `schema.table` or `table`
    pub target_table: String,
    pub primary_key: String,
    /// Field values read as SQL NULL
    pub null_values: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            target_table: defaults::TARGET_TABLE.to_string(),
            primary_key: defaults::PRIMARY_KEY.to_string(),
            null_values: defaults::null_values(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::MAX_CONNECTIONS,
            acquire_timeout_seconds: defaults::ACQUIRE_TIMEOUT_SECONDS,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_concurrent_loads: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: defaults::MAX_CONCURRENT_LOADS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_retry_delay_seconds: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            retry_delay_seconds: defaults::RETRY_DELAY_SECONDS,
            max_retry_delay_seconds: defaults::MAX_RETRY_DELAY_SECONDS,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
        }
    }
}

/// Where the transform command runs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformTarget {
    /// `sh -c <command>` on this host
    Local,
    /// `ssh <options> <destination> <command>`
    Ssh {
        destination: String,
        #[serde(default)]
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    pub enabled: bool,
    pub target: TransformTarget,
    pub command: String,
    /// Exported to the command, typically connection parameters for the transform tool
    pub environment: HashMap<String, String>,
    pub timeout_seconds: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: TransformTarget::Local,
            command: defaults::TRANSFORM_COMMAND.to_string(),
            environment: HashMap::new(),
            timeout_seconds: defaults::TRANSFORM_TIMEOUT_SECONDS,
        }
    }
}

impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl EtlConfig {
    /// Validate the configuration, reporting the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.source.chunk_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "source.chunk_size",
                "0",
                "chunk size must be a positive integer",
            ));
        }
        self.source.delimiter_byte()?;

        if self.load.target_table.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "target_table",
                "load",
            ));
        }
        if self.load.primary_key.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "primary_key",
                "load",
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("url", "database"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "at least one connection is required",
            ));
        }

        if self.execution.max_concurrent_loads == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_loads",
                "0",
                "at least one concurrent load is required",
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
                "multiplier must be >= 1.0",
            ));
        }
        if self.retry.max_retry_delay_seconds < self.retry.retry_delay_seconds {
            return Err(ConfigurationError::invalid_value(
                "retry.max_retry_delay_seconds",
                self.retry.max_retry_delay_seconds.to_string(),
                "max retry delay must not be below retry_delay_seconds",
            ));
        }

        if self.transform.enabled {
            if self.transform.command.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "command",
                    "transform",
                ));
            }
            if self.transform.timeout_seconds == 0 {
                return Err(ConfigurationError::invalid_value(
                    "transform.timeout_seconds",
                    "0",
                    "a transform needs a positive timeout",
                ));
            }
            if let TransformTarget::Ssh { destination, .. } = &self.transform.target {
                if destination.trim().is_empty() {
                    return Err(ConfigurationError::missing_required_field(
                        "destination",
                        "transform.target",
                    ));
                }
            }
        }

        Ok(())
    }
}
