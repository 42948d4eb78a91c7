//! Conversions between JSON values and PostgreSQL bind parameters / rows.
//!
//! Parameters are coerced to the types the server inferred when preparing
//! the statement, so `null` fits any column and `"5"` compares against an
//! integer. Types without a coercion rule bind by their JSON shape.

use std::str::FromStr;

use super::Row;
use crate::types::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, Decode, Postgres, Row as _, Type, TypeInfo};
use uuid::Uuid;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// A parameter coerced to a concrete PostgreSQL type. `None` is a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Bool(Option<bool>),
    Int2(Option<i16>),
    Int4(Option<i32>),
    Int8(Option<i64>),
    Float4(Option<f32>),
    Float8(Option<f64>),
    Numeric(Option<Decimal>),
    Text(Option<String>),
    Json(Option<Value>),
    Uuid(Option<Uuid>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<Utc>>),
    /// No coercion rule for the target type; bound by JSON shape.
    Untyped(Value),
}

/// Coerce `value` to the parameter type named `type_name` (as reported by
/// [`TypeInfo::name`]). `position` is the zero-based index used in errors.
pub fn coerce(value: &Value, type_name: &str, position: usize) -> Result<BindValue> {
    let mismatch = || {
        Error::invalid_argument(format!(
            "params[{}]: cannot use {} as {}",
            position,
            json_kind(value),
            type_name.to_ascii_lowercase()
        ))
    };
    let null = value.is_null();

    let bound = match type_name {
        "BOOL" => BindValue::Bool(if null { None } else { Some(to_bool(value).ok_or_else(mismatch)?) }),
        "INT2" => BindValue::Int2(if null {
            None
        } else {
            Some(to_i64(value).and_then(|i| i16::try_from(i).ok()).ok_or_else(mismatch)?)
        }),
        "INT4" => BindValue::Int4(if null {
            None
        } else {
            Some(to_i64(value).and_then(|i| i32::try_from(i).ok()).ok_or_else(mismatch)?)
        }),
        "INT8" => BindValue::Int8(if null { None } else { Some(to_i64(value).ok_or_else(mismatch)?) }),
        "FLOAT4" => BindValue::Float4(if null {
            None
        } else {
            Some(to_f64(value).ok_or_else(mismatch)? as f32)
        }),
        "FLOAT8" => BindValue::Float8(if null { None } else { Some(to_f64(value).ok_or_else(mismatch)?) }),
        "NUMERIC" => BindValue::Numeric(if null { None } else { Some(to_decimal(value).ok_or_else(mismatch)?) }),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "UNKNOWN" => {
            BindValue::Text(if null { None } else { Some(to_text(value)) })
        }
        "JSON" | "JSONB" => BindValue::Json(if null { None } else { Some(to_json(value)) }),
        "UUID" => BindValue::Uuid(if null {
            None
        } else {
            Some(value.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok()).ok_or_else(mismatch)?)
        }),
        "DATE" => BindValue::Date(if null { None } else { Some(parse_str(value).ok_or_else(mismatch)?) }),
        "TIME" => BindValue::Time(if null { None } else { Some(parse_str(value).ok_or_else(mismatch)?) }),
        "TIMESTAMP" => BindValue::Timestamp(if null {
            None
        } else {
            Some(value.as_str().and_then(parse_timestamp).ok_or_else(mismatch)?)
        }),
        "TIMESTAMPTZ" => BindValue::TimestampTz(if null {
            None
        } else {
            Some(
                value
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .ok_or_else(mismatch)?,
            )
        }),
        _ => BindValue::Untyped(value.clone()),
    };
    Ok(bound)
}

/// Bind `params` against the parameter types of a prepared statement.
pub fn bind_typed<'q>(
    query: PgQuery<'q>,
    params: &[Value],
    types: &[PgTypeInfo],
) -> Result<PgQuery<'q>> {
    if params.len() != types.len() {
        return Err(Error::invalid_argument(format!(
            "statement takes {} parameter(s), got {}",
            types.len(),
            params.len()
        )));
    }

    params
        .iter()
        .zip(types)
        .enumerate()
        .try_fold(query, |q, (i, (value, ty))| {
            Ok(bind(q, coerce(value, ty.name(), i)?))
        })
}

/// Bind one coerced value as the next positional parameter.
pub fn bind(query: PgQuery<'_>, value: BindValue) -> PgQuery<'_> {
    match value {
        BindValue::Bool(v) => query.bind(v),
        BindValue::Int2(v) => query.bind(v),
        BindValue::Int4(v) => query.bind(v),
        BindValue::Int8(v) => query.bind(v),
        BindValue::Float4(v) => query.bind(v),
        BindValue::Float8(v) => query.bind(v),
        BindValue::Numeric(v) => query.bind(v),
        BindValue::Text(v) => query.bind(v),
        BindValue::Json(v) => query.bind(v.map(Json)),
        BindValue::Uuid(v) => query.bind(v),
        BindValue::Date(v) => query.bind(v),
        BindValue::Time(v) => query.bind(v),
        BindValue::Timestamp(v) => query.bind(v),
        BindValue::TimestampTz(v) => query.bind(v),
        BindValue::Untyped(v) => bind_by_shape(query, v),
    }
}

/// Integers bind as `int8`, other numbers as `float8`, strings as `text`,
/// arrays and objects as `jsonb`.
fn bind_by_shape(query: PgQuery<'_>, value: Value) -> PgQuery<'_> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s),
        other => query.bind(Json(other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strings holding a JSON document bind as that document.
fn to_json(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn parse_str<T: FromStr>(value: &Value) -> Option<T> {
    value.as_str().and_then(|s| s.trim().parse().ok())
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::from_str(s)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Convert a row into a column-name → JSON mapping.
pub fn row_to_json(row: &PgRow) -> Row {
    let mut map = Map::with_capacity(row.len());
    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode<'r, T>(row: &'r PgRow, idx: usize) -> std::result::Result<Option<T>, sqlx::Error>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

fn column_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let decoded: std::result::Result<Value, sqlx::Error> = match type_name {
        "BOOL" => decode::<bool>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        "INT2" => decode::<i16>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        "INT4" => decode::<i32>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        "INT8" => decode::<i64>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        "OID" => decode::<sqlx::postgres::types::Oid>(row, idx)
            .map(|v| v.map_or(Value::Null, |oid| Value::from(oid.0))),
        "FLOAT4" => decode::<f32>(row, idx).map(|v| v.map_or(Value::Null, |f| float(f64::from(f)))),
        "FLOAT8" => decode::<f64>(row, idx).map(|v| v.map_or(Value::Null, float)),
        "NUMERIC" => decode::<Decimal>(row, idx).map(|v| v.map_or(Value::Null, decimal)),
        "JSON" | "JSONB" => decode::<Value>(row, idx).map(|v| v.unwrap_or(Value::Null)),
        "UUID" => decode::<Uuid>(row, idx).map(|v| v.map_or(Value::Null, |u| u.to_string().into())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, idx)
            .map(|v| v.map_or(Value::Null, |t| t.to_rfc3339().into())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, idx).map(|v| {
            v.map_or(Value::Null, |t| {
                t.format("%Y-%m-%dT%H:%M:%S%.f").to_string().into()
            })
        }),
        "DATE" => decode::<NaiveDate>(row, idx).map(|v| v.map_or(Value::Null, |d| d.to_string().into())),
        "TIME" => decode::<NaiveTime>(row, idx).map(|v| v.map_or(Value::Null, |t| t.to_string().into())),
        "TEXT[]" | "VARCHAR[]" => decode::<Vec<String>>(row, idx)
            .map(|v| v.map_or(Value::Null, Value::from)),
        "INT4[]" => decode::<Vec<i32>>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        "INT8[]" => decode::<Vec<i64>>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
        _ => decode::<String>(row, idx).map(|v| v.map_or(Value::Null, Value::from)),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!(column = idx, type_name, error = %e, "column not representable as JSON");
        Value::Null
    })
}

/// Finite floats become numbers; NaN and infinities become null.
fn float(f: f64) -> Value {
    serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Exact decimal text with trailing zeros dropped.
fn decimal(d: Decimal) -> Value {
    Value::String(d.normalize().to_string())
}
