//! Argument validation utilities shared by the database operations.

use crate::types::{Error, Result};

/// Longest identifier PostgreSQL keeps without truncation (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Validate that a string is not empty or whitespace.
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::invalid_argument(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate a table or schema name before it is quoted into SQL.
pub fn validate_identifier(s: &str, field: &str) -> Result<()> {
    validate_non_empty(s, field)?;
    if s.contains('\0') {
        return Err(Error::invalid_argument(format!(
            "{} contains a NUL character",
            field
        )));
    }
    if s.len() > MAX_IDENTIFIER_BYTES {
        return Err(Error::invalid_argument(format!(
            "{} exceeds {} bytes",
            field, MAX_IDENTIFIER_BYTES
        )));
    }
    Ok(())
}
