//! Database access layer.
//!
//! [`Database`] is the driver seam: one method per catalog or statement
//! round trip. [`PgDatabase`] implements it against PostgreSQL with a fresh
//! connection per call. The [`ops`] functions layer argument checks and the
//! read-only policy on top and are what the tool handlers call.

pub mod ops;
pub mod policy;
pub mod postgres;
pub mod values;

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use postgres::PgDatabase;

/// One result row, column name to JSON value.
pub type Row = Map<String, Value>;

/// A user table as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: String,
}

/// A column as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_maximum_length: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_default: Option<String>,
}

/// Table reference, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Display form used in messages, e.g. `public.users`.
    pub fn display_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// One round trip per method. Implementations own connection lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// All user tables, ordered by schema then name.
    async fn list_tables(&self) -> Result<Vec<TableInfo>>;

    /// Columns of `table` in ordinal order; empty when the table is unknown.
    async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>>;

    /// Run a statement in a read-only transaction and collect every row.
    async fn fetch_rows(&self, query: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement inside one transaction and return rows affected.
    async fn execute_write(&self, query: &str, params: &[Value]) -> Result<u64>;

    /// `COUNT(*)` over `table`.
    async fn count_rows(&self, table: &TableRef) -> Result<i64>;
}
