//! # Target Store
//!
//! The seam between the loader and the relational target. The loader only needs two
//! capabilities: describe a relation's columns, and execute one merge statement.
//! [`PgTargetStore`] provides them on a `sqlx` PostgreSQL pool; tests substitute an
//! in-memory implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::debug;

use super::merge::{MergeStatement, TableDescription, TableName, TargetColumn};
use crate::error::{EtlError, EtlResult};

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Columns of `table` in declaration order; `NotFound` when the relation does not exist.
    async fn describe_table(&self, table: &TableName) -> EtlResult<TableDescription>;

    /// Execute `statement` as one round trip, returning the number of rows merged.
    async fn execute_merge(&self, statement: &MergeStatement) -> EtlResult<u64>;
}

#[async_trait]
impl<T: TargetStore + ?Sized> TargetStore for Arc<T> {
    async fn describe_table(&self, table: &TableName) -> EtlResult<TableDescription> {
        (**self).describe_table(table).await
    }

    async fn execute_merge(&self, statement: &MergeStatement) -> EtlResult<u64> {
        (**self).execute_merge(statement).await
    }
}

const DESCRIBE_TABLE_SQL: &str = r#"
SELECT a.attname::text AS column_name,
       format_type(a.atttypid, a.atttypmod) AS data_type
FROM pg_catalog.pg_attribute a
WHERE a.attrelid = to_regclass($1)
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

#[derive(Debug, FromRow)]
struct CatalogColumn {
    column_name: String,
    data_type: String,
}

/// PostgreSQL target. Each call checks a connection out of the pool for its own
/// use, so concurrent loads never share a session.
#[derive(Debug, Clone)]
pub struct PgTargetStore {
    pool: PgPool,
}

impl PgTargetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn describe_table(&self, table: &TableName) -> EtlResult<TableDescription> {
        let columns: Vec<CatalogColumn> = sqlx::query_as(DESCRIBE_TABLE_SQL)
            .bind(table.qualified())
            .fetch_all(&self.pool)
            .await?;

        if columns.is_empty() {
            return Err(EtlError::NotFound(format!("target table {table} does not exist")));
        }

        debug!(
            table = %table,
            columns = columns.len(),
            "Described target table"
        );

        Ok(TableDescription::new(
            columns
                .into_iter()
                .map(|c| TargetColumn::new(c.column_name, c.data_type))
                .collect(),
        ))
    }

    async fn execute_merge(&self, statement: &MergeStatement) -> EtlResult<u64> {
        let mut conn = self.pool.acquire().await?;

        let mut query = sqlx::query(statement.sql());
        for value in statement.parameters() {
            query = query.bind(value);
        }

        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}
