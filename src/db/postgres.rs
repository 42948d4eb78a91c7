//! PostgreSQL implementation of [`Database`].
//!
//! Every call opens its own connection, runs under the configured query
//! timeout, and releases the connection before returning. Nothing is pooled
//! or retried.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode, PgTypeInfo};
use sqlx::{Connection, Either, Executor, Row as _, Statement};
use tracing::{debug, instrument, warn};

use super::values::{bind_typed, row_to_json};
use super::{ColumnInfo, Database, Row, TableInfo, TableRef};
use crate::types::{DatabaseConfig, Error, Result};

const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text AS name, table_schema::text AS schema
    FROM information_schema.tables
    WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
    ORDER BY table_schema, table_name
"#;

const DESCRIBE_TABLE_SQL: &str = r#"
    SELECT
        column_name::text AS column_name,
        data_type::text AS data_type,
        (is_nullable = 'YES') AS nullable,
        character_maximum_length::int4 AS character_maximum_length,
        column_default::text AS column_default
    FROM information_schema.columns
    WHERE table_name::text = $1::text
      AND table_schema::text = COALESCE(
          $2::text,
          (SELECT n.nspname::text
           FROM pg_catalog.pg_class c
           JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
           WHERE c.oid = to_regclass(quote_ident($1::text)))
      )
      AND table_schema NOT IN ('pg_catalog', 'information_schema')
    ORDER BY ordinal_position
"#;

/// PostgreSQL-backed database with per-call connections.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    options: PgConnectOptions,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl PgDatabase {
    /// Build from configuration. Parses the connection string eagerly so a
    /// malformed URL fails at startup.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| Error::config(format!("invalid database.url: {}", e)))?;

        if !config.url.contains("sslmode=") {
            let mode = match &config.ssl_mode {
                Some(mode) => PgSslMode::from_str(mode)
                    .map_err(|e| Error::config(format!("invalid database.sslMode: {}", e)))?,
                None => PgSslMode::Prefer,
            };
            options = options.ssl_mode(mode);
        }

        Ok(Self {
            options,
            connect_timeout: config.connect_timeout,
            query_timeout: config.query_timeout,
        })
    }

    async fn connect(&self) -> Result<PgConnection> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
        {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(Error::execution(format!(
                "connecting to database timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    /// Scoped acquisition: open, run `op` under the query timeout, release.
    ///
    /// On success or error the connection is closed gracefully; on timeout
    /// it is dropped, which tears the socket down.
    async fn with_connection<T, F>(&self, what: &'static str, op: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut conn = self.connect().await?;

        let outcome = tokio::time::timeout(self.query_timeout, op(&mut conn)).await;

        match outcome {
            Ok(result) => {
                if let Err(e) = conn.close().await {
                    debug!(error = %e, "connection close failed");
                }
                result
            }
            Err(_) => {
                warn!(operation = what, timeout = ?self.query_timeout, "database call timed out");
                drop(conn);
                Err(Error::execution(format!(
                    "{} timed out after {:?}",
                    what, self.query_timeout
                )))
            }
        }
    }
}

/// Parameter types the server infers for `query`. Skips the prepare round
/// trip when there is nothing to bind.
async fn parameter_types(
    conn: &mut PgConnection,
    query: &str,
    params: &[Value],
) -> std::result::Result<Vec<PgTypeInfo>, sqlx::Error> {
    if params.is_empty() {
        return Ok(Vec::new());
    }
    let statement = (&mut *conn).prepare(query).await?;
    Ok(match statement.parameters() {
        Some(Either::Left(types)) => types.to_vec(),
        Some(Either::Right(_)) | None => Vec::new(),
    })
}

/// Run a write with typed parameters. Driver failures surface as
/// [`Error::Execution`] so the caller can roll back.
async fn execute_typed(conn: &mut PgConnection, query: &str, params: &[Value]) -> Result<u64> {
    let types = parameter_types(conn, query, params)
        .await
        .map_err(|e| Error::execution(e.to_string()))?;
    let done = bind_typed(sqlx::query(query), params, &types)?
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::execution(e.to_string()))?;
    Ok(done.rows_affected())
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quoted, optionally schema-qualified table name.
pub fn qualified_name(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&table.name)),
        None => quote_ident(&table.name),
    }
}

#[async_trait]
impl Database for PgDatabase {
    #[instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        self.with_connection("list_tables", |conn| {
            Box::pin(async move {
                let rows = sqlx::query(LIST_TABLES_SQL).fetch_all(&mut *conn).await?;
                rows.iter()
                    .map(|row| -> Result<TableInfo> {
                        Ok(TableInfo {
                            name: row.try_get("name")?,
                            schema: row.try_get("schema")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    #[instrument(skip(self, table), fields(table = %table.display_name()))]
    async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        let table = table.clone();
        self.with_connection("describe_table", move |conn| {
            Box::pin(async move {
                let rows = sqlx::query(DESCRIBE_TABLE_SQL)
                    .bind(&table.name)
                    .bind(&table.schema)
                    .fetch_all(&mut *conn)
                    .await?;
                rows.iter()
                    .map(|row| -> Result<ColumnInfo> {
                        Ok(ColumnInfo {
                            column_name: row.try_get("column_name")?,
                            data_type: row.try_get("data_type")?,
                            nullable: row.try_get("nullable")?,
                            character_maximum_length: row.try_get("character_maximum_length")?,
                            column_default: row.try_get("column_default")?,
                        })
                    })
                    .collect()
            })
        })
        .await
    }

    #[instrument(skip(self, params), fields(param_count = params.len()))]
    async fn fetch_rows(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        let query = query.to_string();
        let params = params.to_vec();
        self.with_connection("read query", move |conn| {
            Box::pin(async move {
                let mut tx = conn.begin().await?;
                sqlx::query("SET TRANSACTION READ ONLY")
                    .execute(&mut *tx)
                    .await?;
                let types = parameter_types(&mut *tx, &query, &params).await?;
                let rows = bind_typed(sqlx::query(&query), &params, &types)?
                    .fetch_all(&mut *tx)
                    .await?;
                tx.rollback().await?;
                Ok(rows.iter().map(row_to_json).collect())
            })
        })
        .await
    }

    #[instrument(skip(self, params), fields(param_count = params.len()))]
    async fn execute_write(&self, query: &str, params: &[Value]) -> Result<u64> {
        let query = query.to_string();
        let params = params.to_vec();
        self.with_connection("write query", move |conn| {
            Box::pin(async move {
                let mut tx = conn.begin().await?;
                match execute_typed(&mut *tx, &query, &params).await {
                    Ok(affected) => {
                        tx.commit().await?;
                        Ok(affected)
                    }
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            warn!(error = %rollback, "rollback failed");
                        }
                        Err(e)
                    }
                }
            })
        })
        .await
    }

    #[instrument(skip(self, table), fields(table = %table.display_name()))]
    async fn count_rows(&self, table: &TableRef) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", qualified_name(table));
        self.with_connection("count rows", move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql).fetch_one(&mut *conn).await?;
                Ok(row.try_get::<i64, _>("count")?)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualified_name() {
        let table = TableRef::new("users").with_schema(Some("public".to_string()));
        assert_eq!(qualified_name(&table), "\"public\".\"users\"");
        assert_eq!(qualified_name(&TableRef::new("Order Items")), "\"Order Items\"");
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            ..DatabaseConfig::default()
        };
        let err = PgDatabase::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_config_rejects_bad_ssl_mode() {
        let config = DatabaseConfig {
            url: "postgres://localhost/app".to_string(),
            ssl_mode: Some("sometimes".to_string()),
            ..DatabaseConfig::default()
        };
        assert!(PgDatabase::from_config(&config).is_err());
    }

    #[test]
    fn test_ssl_mode_defaults_to_prefer() {
        let config = DatabaseConfig {
            url: "postgres://localhost/app".to_string(),
            ..DatabaseConfig::default()
        };
        let db = PgDatabase::from_config(&config).unwrap();
        assert!(matches!(db.options.get_ssl_mode(), PgSslMode::Prefer));
    }

    #[test]
    fn test_ssl_mode_in_url_wins_over_config() {
        let config = DatabaseConfig {
            url: "postgres://localhost/app?sslmode=require".to_string(),
            ssl_mode: Some("disable".to_string()),
            ..DatabaseConfig::default()
        };
        let db = PgDatabase::from_config(&config).unwrap();
        assert!(matches!(db.options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_from_config_keeps_timeouts() {
        let config = DatabaseConfig {
            url: "postgres://u:p@localhost:5432/app".to_string(),
            query_timeout: Duration::from_secs(3),
            ssl_mode: Some("disable".to_string()),
            ..DatabaseConfig::default()
        };
        let db = PgDatabase::from_config(&config).unwrap();
        assert_eq!(db.query_timeout, Duration::from_secs(3));
        assert_eq!(db.connect_timeout, Duration::from_secs(10));
    }
}
