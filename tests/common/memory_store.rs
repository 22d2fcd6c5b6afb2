//! In-memory target store applying merge semantics without a database.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use txn_merge_loader::load::{MergeStatement, TableDescription, TableName, TargetStore};
use txn_merge_loader::{EtlError, EtlResult};

/// A stored row: column values plus the system-managed load timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub values: HashMap<String, Option<String>>,
    pub load_timestamp: DateTime<Utc>,
}

impl StoredRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }
}

#[derive(Debug)]
struct MemoryTable {
    description: TableDescription,
    primary_key: String,
    rows: BTreeMap<String, StoredRow>,
}

/// Target store keeping tables in memory.
///
/// Failures can be injected: a number of upcoming executions can be made to fail
/// with a retryable connectivity error, and statements carrying a poisoned key
/// are rejected the way a constraint violation would be.
#[derive(Debug, Default)]
pub struct InMemoryTargetStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    transient_failures: AtomicUsize,
    poisoned_keys: Mutex<HashSet<String>>,
    executions: AtomicUsize,
}

impl InMemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: &str, description: TableDescription, primary_key: &str) -> Self {
        self.tables.lock().unwrap().insert(
            table.to_string(),
            MemoryTable {
                description,
                primary_key: primary_key.to_string(),
                rows: BTreeMap::new(),
            },
        );
        self
    }

    /// Make the next `count` executions fail with `ConnectivityError`
    pub fn fail_next_executions(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Reject any statement that carries `key` as a primary key value
    pub fn poison_key(&self, key: &str) {
        self.poisoned_keys.lock().unwrap().insert(key.to_string());
    }

    /// Rows of `table` ordered by primary key text
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, key: &str) -> Option<StoredRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|t| t.rows.get(key).cloned())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Number of statements applied successfully
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Seed a row as if an earlier load had written it just now
    pub fn seed_row(&self, table: &str, values: &[(&str, Option<&str>)]) {
        self.seed_row_at(table, values, Utc::now());
    }

    /// Seed a row as if an earlier load had written it at `load_timestamp`
    pub fn seed_row_at(
        &self,
        table: &str,
        values: &[(&str, Option<&str>)],
        load_timestamp: DateTime<Utc>,
    ) {
        let mut tables = self.tables.lock().unwrap();
        let target = tables.get_mut(table).expect("table registered");
        let values: HashMap<String, Option<String>> = values
            .iter()
            .map(|(c, v)| (c.to_string(), v.map(str::to_string)))
            .collect();
        let key = values
            .get(&target.primary_key)
            .cloned()
            .flatten()
            .expect("seeded row has a key");
        target.rows.insert(
            key,
            StoredRow {
                values,
                load_timestamp,
            },
        );
    }

    /// Move every stored `load_timestamp` of `table` back by `by`
    pub fn age_rows(&self, table: &str, by: chrono::Duration) {
        if let Some(target) = self.tables.lock().unwrap().get_mut(table) {
            for row in target.rows.values_mut() {
                row.load_timestamp -= by;
            }
        }
    }
}

#[async_trait]
impl TargetStore for InMemoryTargetStore {
    async fn describe_table(&self, table: &TableName) -> EtlResult<TableDescription> {
        self.tables
            .lock()
            .unwrap()
            .get(&table.to_string())
            .map(|t| t.description.clone())
            .ok_or_else(|| EtlError::NotFound(format!("relation {table} does not exist")))
    }

    async fn execute_merge(&self, statement: &MergeStatement) -> EtlResult<u64> {
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(EtlError::ConnectivityError(
                "connection reset by peer".to_string(),
            ));
        }

        let key_index = statement
            .columns()
            .iter()
            .position(|c| c == statement.primary_key())
            .ok_or_else(|| EtlError::SchemaMismatch("key column missing".to_string()))?;

        {
            let poisoned = self.poisoned_keys.lock().unwrap();
            if let Some(key) = statement
                .rows()
                .iter()
                .filter_map(|row| row[key_index].as_deref())
                .find(|key| poisoned.contains(*key))
            {
                return Err(EtlError::Database(format!(
                    "row with key {key} violates check constraint (SQLSTATE 23514)"
                )));
            }
        }

        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(&statement.table().to_string())
            .ok_or_else(|| EtlError::NotFound(format!("relation {} does not exist", statement.table())))?;

        // one timestamp per statement, as CURRENT_TIMESTAMP is per transaction
        let now = Utc::now();
        for row in statement.rows() {
            let Some(key) = row[key_index].clone() else {
                continue;
            };
            let incoming = statement.columns().iter().cloned().zip(row.iter().cloned());
            match table.rows.get_mut(&key) {
                Some(existing) => {
                    for (column, value) in incoming {
                        if column != statement.primary_key() {
                            existing.values.insert(column, value);
                        }
                    }
                    existing.load_timestamp = now;
                }
                None => {
                    table.rows.insert(
                        key,
                        StoredRow {
                            values: incoming.collect(),
                            load_timestamp: now,
                        },
                    );
                }
            }
        }

        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(statement.row_count() as u64)
    }
}
