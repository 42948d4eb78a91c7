//! Database operations exposed as tools.
//!
//! Each operation checks its arguments before making exactly one round trip
//! through the [`Database`] seam.

use serde::Serialize;
use serde_json::Value;

use super::policy;
use super::{ColumnInfo, Database, Row, TableInfo, TableRef};
use crate::types::{Error, Result};
use crate::validation::{validate_identifier, validate_non_empty};

/// Rows returned by a read statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRows {
    pub rows: Vec<Row>,
    pub count: usize,
}

/// Outcome of a committed write statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    pub message: String,
}

/// Column listing of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

/// Row count of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table_name: String,
    pub count: i64,
}

/// Result of [`run_custom_sql`], shaped by the path the statement took.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlOutcome {
    Rows(QueryRows),
    Write(WriteOutcome),
}

/// All user tables, ordered by schema then name.
pub async fn list_tables(db: &dyn Database) -> Result<Vec<TableInfo>> {
    db.list_tables().await
}

/// Columns of `table_name`; `NotFound` when the table does not exist.
pub async fn describe_table(
    db: &dyn Database,
    table_name: &str,
    schema: Option<&str>,
) -> Result<TableDescription> {
    let table = table_ref(table_name, schema)?;
    let columns = db.describe_table(&table).await?;
    if columns.is_empty() {
        return Err(Error::not_found(format!(
            "Table '{}' not found",
            table.display_name()
        )));
    }
    Ok(TableDescription {
        table_name: table.name,
        schema: table.schema,
        columns,
    })
}

/// Run a read-only statement. Anything that fails the read-only policy is
/// rejected before a connection is opened.
pub async fn run_read_query(db: &dyn Database, query: &str, params: &[Value]) -> Result<QueryRows> {
    policy::check_read_only(query)?;
    let rows = db.fetch_rows(query, params).await?;
    let count = rows.len();
    Ok(QueryRows { rows, count })
}

/// Run a write statement in its own transaction.
pub async fn run_write_query(
    db: &dyn Database,
    query: &str,
    params: &[Value],
) -> Result<WriteOutcome> {
    validate_non_empty(query, "query")?;
    let rows_affected = db.execute_write(query, params).await?;
    Ok(WriteOutcome {
        rows_affected,
        message: format!(
            "Query executed successfully. {} row(s) affected.",
            rows_affected
        ),
    })
}

/// Total number of rows in `table_name`.
pub async fn get_table_count(
    db: &dyn Database,
    table_name: &str,
    schema: Option<&str>,
) -> Result<TableCount> {
    let table = table_ref(table_name, schema)?;
    let count = db.count_rows(&table).await?;
    Ok(TableCount {
        table_name: table.display_name(),
        count,
    })
}

/// Route a statement by its leading keyword: reads return rows, everything
/// else goes to the write path. The keyword denylist is not applied here;
/// [`Database::fetch_rows`] runs in a read-only transaction.
pub async fn run_custom_sql(db: &dyn Database, sql: &str, params: &[Value]) -> Result<SqlOutcome> {
    validate_non_empty(sql, "sql")?;
    if policy::starts_with_read_keyword(sql) {
        let rows = db.fetch_rows(sql, params).await?;
        let count = rows.len();
        Ok(SqlOutcome::Rows(QueryRows { rows, count }))
    } else {
        run_write_query(db, sql, params).await.map(SqlOutcome::Write)
    }
}

fn table_ref(table_name: &str, schema: Option<&str>) -> Result<TableRef> {
    validate_identifier(table_name, "table_name")?;
    if let Some(schema) = schema {
        validate_identifier(schema, "schema")?;
    }
    Ok(TableRef::new(table_name).with_schema(schema.map(str::to_string)))
}
