//! MERGE statement construction.
//!
//! Field values never reach the SQL text. Each non-null value becomes a numbered
//! bind parameter cast to the target column's declared type; a null value is
//! rendered as a typed `NULL` keyword. Identifiers are quoted with
//! `pg_escape::quote_identifier` and column types come from the target's catalog,
//! so nothing read from the partition is interpolated unescaped.

use pg_escape::quote_identifier;
use std::collections::HashSet;
use std::fmt;

use super::reader::PartitionData;
use crate::constants::{CURRENT_TIMESTAMP_SQL, LOAD_TIMESTAMP_COLUMN, MAX_BIND_PARAMETERS};
use crate::error::{EtlError, EtlResult};

/// `schema.table` or a bare `table` resolved through the search path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn parse(input: &str) -> EtlResult<Self> {
        let invalid = || {
            EtlError::InvalidInput(format!(
                "target table '{input}' must be 'table' or 'schema.table'"
            ))
        };

        let parts: Vec<&str> = input.trim().split('.').map(str::trim).collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(Self {
                schema: None,
                name: (*name).to_string(),
            }),
            [schema, name] if !schema.is_empty() && !name.is_empty() => Ok(Self {
                schema: Some((*schema).to_string()),
                name: (*name).to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// Quoted, optionally schema-qualified name for use in SQL text
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name).to_string(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A column as declared on the target relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumn {
    pub name: String,
    /// Type as rendered by the catalog, e.g. `numeric(12,2)`
    pub data_type: String,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Columns of the target relation in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableDescription {
    pub columns: Vec<TargetColumn>,
}

impl TableDescription {
    pub fn new(columns: Vec<TargetColumn>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&TargetColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One partition rendered as a single idempotent MERGE.
///
/// Matching is `target.pk = source.pk`; matched rows get every non-key column and a
/// fresh `load_timestamp`, unmatched rows are inserted with a fresh `load_timestamp`.
#[derive(Debug, Clone)]
pub struct MergeStatement {
    table: TableName,
    columns: Vec<String>,
    primary_key: String,
    rows: Vec<Vec<Option<String>>>,
    sql: String,
}

impl MergeStatement {
    /// Validate `partition` against `target` and render the statement.
    pub fn build(
        table: &TableName,
        target: &TableDescription,
        partition: PartitionData,
        primary_key: &str,
    ) -> EtlResult<Self> {
        let key_index = partition.column_index(primary_key).ok_or_else(|| {
            EtlError::InvalidInput(format!(
                "primary key column '{primary_key}' is not in the partition header {:?}",
                partition.columns
            ))
        })?;

        if partition.column_index(LOAD_TIMESTAMP_COLUMN).is_some() {
            return Err(EtlError::InvalidInput(format!(
                "source column '{LOAD_TIMESTAMP_COLUMN}' collides with the system-managed column"
            )));
        }

        let mut column_types = Vec::with_capacity(partition.columns.len());
        let mut missing = Vec::new();
        for column in &partition.columns {
            match target.column(column) {
                Some(target_column) => column_types.push(target_column.data_type.clone()),
                None => missing.push(column.clone()),
            }
        }
        if target.column(LOAD_TIMESTAMP_COLUMN).is_none() {
            missing.push(LOAD_TIMESTAMP_COLUMN.to_string());
        }
        if !missing.is_empty() {
            return Err(EtlError::SchemaMismatch(format!(
                "{table} has no column(s) {}",
                missing.join(", ")
            )));
        }

        if partition.rows.is_empty() {
            return Err(EtlError::InvalidInput(
                "cannot build a merge from a partition without rows".to_string(),
            ));
        }

        let mut keys = HashSet::with_capacity(partition.rows.len());
        for (row_number, row) in partition.rows.iter().enumerate() {
            if row.len() != partition.columns.len() {
                return Err(EtlError::InvalidInput(format!(
                    "row {} has {} fields, header has {}",
                    row_number + 1,
                    row.len(),
                    partition.columns.len()
                )));
            }
            match row[key_index].as_deref() {
                None => {
                    return Err(EtlError::InvalidInput(format!(
                        "row {} has a NULL primary key '{primary_key}'",
                        row_number + 1
                    )))
                }
                Some(key) if !keys.insert(key) => {
                    return Err(EtlError::InvalidInput(format!(
                        "row {} repeats primary key {primary_key} = '{key}' within one partition",
                        row_number + 1
                    )))
                }
                Some(_) => {}
            }
        }

        let parameter_count = partition
            .rows
            .iter()
            .flatten()
            .filter(|value| value.is_some())
            .count();
        if parameter_count > MAX_BIND_PARAMETERS {
            return Err(EtlError::InvalidInput(format!(
                "partition needs {parameter_count} bind parameters, above the limit of {MAX_BIND_PARAMETERS}; use a smaller chunk size"
            )));
        }

        let sql = render_sql(
            table,
            &partition.columns,
            &column_types,
            primary_key,
            &partition.rows,
        );

        Ok(Self {
            table: table.clone(),
            columns: partition.columns,
            primary_key: primary_key.to_string(),
            rows: partition.rows,
            sql,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Values for `$1..$n`, row-major, nulls skipped
    pub fn parameters(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().flatten().filter_map(|value| value.as_deref())
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().count()
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn render_sql(
    table: &TableName,
    columns: &[String],
    column_types: &[String],
    primary_key: &str,
    rows: &[Vec<Option<String>>],
) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c).to_string()).collect();
    let key = quote_identifier(primary_key);
    let load_ts = quote_identifier(LOAD_TIMESTAMP_COLUMN);

    let mut sql = String::with_capacity(256 + rows.len() * columns.len() * 24);
    sql.push_str(&format!("MERGE INTO {} AS target\nUSING (VALUES ", table.qualified()));

    let mut placeholder = 0usize;
    for (row_idx, row) in rows.iter().enumerate() {
        if row_idx > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (pos, value) in row.iter().enumerate() {
            if pos > 0 {
                sql.push_str(", ");
            }
            match value {
                Some(_) => {
                    placeholder += 1;
                    sql.push_str(&format!("CAST(${placeholder} AS {})", column_types[pos]));
                }
                None => sql.push_str(&format!("CAST(NULL AS {})", column_types[pos])),
            }
        }
        sql.push(')');
    }

    sql.push_str(&format!(
        ") AS source ({})\nON target.{key} = source.{key}\nWHEN MATCHED THEN\n    UPDATE SET ",
        quoted.join(", ")
    ));
    for column in quoted.iter().filter(|c| c.as_str() != &*key) {
        sql.push_str(&format!("{column} = source.{column}, "));
    }
    sql.push_str(&format!("{load_ts} = {CURRENT_TIMESTAMP_SQL}"));

    let source_columns: Vec<String> = quoted.iter().map(|c| format!("source.{c}")).collect();
    sql.push_str(&format!(
        "\nWHEN NOT MATCHED THEN\n    INSERT ({}, {load_ts})\n    VALUES ({}, {CURRENT_TIMESTAMP_SQL})",
        quoted.join(", "),
        source_columns.join(", ")
    ));

    sql
}
