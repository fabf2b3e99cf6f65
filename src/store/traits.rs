//! `RelationalStore` trait: the request/response interface to whatever
//! relational backend holds agents and their knowledge files.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::DatabaseError;

/// One row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Backend-agnostic read access to relational tables.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Fetch exactly one row. No match is `DatabaseError::NotFound`.
    async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Row, DatabaseError>;

    /// Fetch every matching row, in insertion order. No match is an empty vec.
    async fn fetch_many(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, DatabaseError>;
}

/// Decode a row into a typed record.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| DatabaseError::Serialization(e.to_string()))
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `name` is safe to splice into a query as a table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Reject table/column names that are not plain identifiers.
pub fn check_identifiers(table: &str, filter: &Filter) -> Result<(), DatabaseError> {
    for name in [table, filter.column.as_str()] {
        if !is_valid_identifier(name) {
            return Err(DatabaseError::Query(format!("Invalid identifier: {name:?}")));
        }
    }
    Ok(())
}
