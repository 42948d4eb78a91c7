//! Read-only statement policy.
//!
//! A keyword denylist, not a SQL parser. It is conservative (a column named
//! `comment` is rejected) and not airtight against obfuscated statements;
//! pair it with a read-only database role where that matters.

use crate::types::{Error, Result};

/// Keywords a read statement may start with.
const READ_LEADING: &[&str] = &["SELECT", "WITH", "SHOW", "EXPLAIN", "VALUES", "TABLE"];

/// Whole-word tokens that disqualify a statement from the read path.
const MUTATING: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "DROP", "CREATE", "ALTER", "TRUNCATE",
    "GRANT", "REVOKE", "COPY", "VACUUM", "REINDEX", "CLUSTER", "COMMENT", "LOCK", "CALL", "DO",
    "REFRESH", "ATTACH", "DETACH", "IMPORT", "SECURITY", "SET", "RESET", "DISCARD", "LISTEN",
    "NOTIFY", "PREPARE", "EXECUTE", "DEALLOCATE", "INTO",
];

/// Split on anything that cannot be part of an unquoted identifier.
fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .filter(|w| !w.is_empty())
}

/// Reject `sql` unless it looks like a pure read.
pub fn check_read_only(sql: &str) -> Result<()> {
    let Some(first) = words(sql).next() else {
        return Err(Error::invalid_argument("query cannot be empty"));
    };

    if !READ_LEADING.iter().any(|k| first.eq_ignore_ascii_case(k)) {
        return Err(Error::invalid_operation(format!(
            "only read statements are allowed here (statement starts with {})",
            first.to_ascii_uppercase()
        )));
    }

    if let Some(keyword) = words(sql).find(|w| MUTATING.iter().any(|k| w.eq_ignore_ascii_case(k)))
    {
        return Err(Error::invalid_operation(format!(
            "only read statements are allowed here (found {})",
            keyword.to_ascii_uppercase()
        )));
    }

    Ok(())
}

/// Whether the first word of `sql` is a read keyword. Says nothing about the
/// rest of the statement.
pub fn starts_with_read_keyword(sql: &str) -> bool {
    words(sql)
        .next()
        .is_some_and(|first| READ_LEADING.iter().any(|k| first.eq_ignore_ascii_case(k)))
}

/// Whether `sql` passes [`check_read_only`].
pub fn is_read_only(sql: &str) -> bool {
    check_read_only(sql).is_ok()
}
