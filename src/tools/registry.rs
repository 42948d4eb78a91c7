//! The closed set of database tools and their handlers.

use serde_json::{json, Value};

use super::args::ToolArgs;
use super::catalog::{ParamDef, ParamType, ToolDescriptor};
use super::dispatch::{ToolContext, ToolFuture, ToolHandler};
use crate::db::ops;

/// Descriptor/handler pairs in discovery order.
pub fn database_tools() -> Vec<(ToolDescriptor, ToolHandler)> {
    vec![
        (
            ToolDescriptor::new(
                "list_tables",
                "List all tables in the database with their schemas",
            ),
            list_tables as ToolHandler,
        ),
        (
            ToolDescriptor::new(
                "describe_table",
                "Get column information for a table: names, types, nullability and defaults",
            )
            .param(ParamDef::required(
                "table_name",
                ParamType::String,
                "Name of the table to describe",
            ))
            .param(ParamDef::optional(
                "schema",
                ParamType::String,
                "Schema containing the table (any user schema if omitted)",
            )),
            describe_table as ToolHandler,
        ),
        (
            ToolDescriptor::new(
                "run_read_query",
                "Execute a read-only query (SELECT, WITH, SHOW, EXPLAIN) and return the rows. \
                 Statements containing mutating keywords are rejected.",
            )
            .param(ParamDef::required("query", ParamType::String, "SQL query to execute"))
            .param(ParamDef::optional(
                "params",
                ParamType::ScalarList,
                "Positional bind values for $1, $2, ...",
            )),
            run_read_query as ToolHandler,
        ),
        (
            ToolDescriptor::new(
                "run_write_query",
                "Execute an INSERT, UPDATE, DELETE or DDL statement in one transaction",
            )
            .param(ParamDef::required("query", ParamType::String, "SQL statement to execute"))
            .param(ParamDef::optional(
                "params",
                ParamType::ScalarList,
                "Positional bind values for $1, $2, ...",
            )),
            run_write_query as ToolHandler,
        ),
        (
            ToolDescriptor::new("get_table_count", "Get the total number of rows in a table")
                .param(ParamDef::required("table_name", ParamType::String, "Name of the table"))
                .param(ParamDef::optional(
                    "schema",
                    ParamType::String,
                    "Schema containing the table (search path if omitted)",
                )),
            get_table_count as ToolHandler,
        ),
        (
            ToolDescriptor::new(
                "run_custom_sql",
                "Execute any SQL statement; reads return rows, everything else runs as a write",
            )
            .param(ParamDef::required("sql", ParamType::String, "SQL statement to execute"))
            .param(ParamDef::optional(
                "params",
                ParamType::ScalarList,
                "Positional bind values for $1, $2, ...",
            )),
            run_custom_sql as ToolHandler,
        ),
    ]
}

fn list_tables(ctx: ToolContext, _args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let tables = ops::list_tables(ctx.database.as_ref()).await?;
        Ok(json!({
            "count": tables.len(),
            "tables": tables,
        }))
    })
}

fn describe_table(ctx: ToolContext, args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let table_name = args.str_field("table_name")?;
        let schema = args.opt_str_field("schema")?;
        let description =
            ops::describe_table(ctx.database.as_ref(), &table_name, schema.as_deref()).await?;
        Ok(serde_json::to_value(description)?)
    })
}

fn run_read_query(ctx: ToolContext, args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let query = args.str_field("query")?;
        let params = args.bind_values("params")?;
        let rows = ops::run_read_query(ctx.database.as_ref(), &query, &params).await?;
        Ok(serde_json::to_value(rows)?)
    })
}

fn run_write_query(ctx: ToolContext, args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let query = args.str_field("query")?;
        let params = args.bind_values("params")?;
        let outcome = ops::run_write_query(ctx.database.as_ref(), &query, &params).await?;
        Ok(serde_json::to_value(outcome)?)
    })
}

fn get_table_count(ctx: ToolContext, args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let table_name = args.str_field("table_name")?;
        let schema = args.opt_str_field("schema")?;
        let count =
            ops::get_table_count(ctx.database.as_ref(), &table_name, schema.as_deref()).await?;
        Ok(serde_json::to_value(count)?)
    })
}

fn run_custom_sql(ctx: ToolContext, args: ToolArgs) -> ToolFuture {
    Box::pin(async move {
        let sql = args.str_field("sql")?;
        let params = args.bind_values("params")?;
        let outcome = ops::run_custom_sql(ctx.database.as_ref(), &sql, &params).await?;
        let value: Value = serde_json::to_value(outcome)?;
        Ok(value)
    })
}
