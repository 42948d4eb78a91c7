//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Every
//! variant maps onto a wire-level [`ErrorKind`] so that the dispatcher can
//! report "bad input", "bad target" and "backend failure" distinctly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kind as reported to tool callers in `{error: {kind, message}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownTool,
    MissingArgument,
    InvalidArgument,
    InvalidOperation,
    NotFound,
    ExecutionError,
    ConfigError,
    HandlerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "UnknownTool",
            ErrorKind::MissingArgument => "MissingArgument",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ExecutionError => "ExecutionError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::HandlerError => "HandlerError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error enum for pgbridge.
#[derive(Error, Debug)]
pub enum Error {
    /// No handler is registered under the requested tool name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A required tool argument is absent or null.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// A tool argument is present but malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request is well-formed but disallowed by policy (e.g. a write
    /// statement sent to the read-only query tool).
    #[error("operation not allowed: {0}")]
    InvalidOperation(String),

    /// Target table or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Driver, transport or timeout failure while talking to the database.
    #[error("execution error: {0}")]
    Execution(String),

    /// Configuration missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Anything else raised by a tool handler.
    #[error("handler error: {0}")]
    Handler(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wire-level kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownTool(_) => ErrorKind::UnknownTool,
            Error::MissingArgument(_) => ErrorKind::MissingArgument,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Execution(_) => ErrorKind::ExecutionError,
            Error::Config(_) => ErrorKind::ConfigError,
            Error::Handler(_) | Error::Serialization(_) => ErrorKind::HandlerError,
            Error::Io(_) => ErrorKind::ConfigError,
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Error::UnknownTool(msg)
            | Error::MissingArgument(msg)
            | Error::InvalidArgument(msg)
            | Error::InvalidOperation(msg)
            | Error::NotFound(msg)
            | Error::Execution(msg)
            | Error::Config(msg)
            | Error::Handler(msg) => msg.clone(),
            Error::Serialization(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
        }
    }
}

// Convenience constructors
impl Error {
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    pub fn missing_argument(field: impl Into<String>) -> Self {
        Self::MissingArgument(field.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
                Error::NotFound(db.message().to_string())
            }
            _ => Error::Execution(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::unknown_tool("x").kind(), ErrorKind::UnknownTool);
        assert_eq!(Error::missing_argument("q").kind(), ErrorKind::MissingArgument);
        assert_eq!(Error::execution("boom").kind(), ErrorKind::ExecutionError);
        assert_eq!(Error::config("bad").kind(), ErrorKind::ConfigError);

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn test_message_has_no_prefix() {
        let err = Error::not_found("Table 'users' not found");
        assert_eq!(err.message(), "Table 'users' not found");
        assert_eq!(err.to_string(), "not found: Table 'users' not found");
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let value = serde_json::to_value(ErrorKind::InvalidOperation).unwrap();
        assert_eq!(value, serde_json::json!("InvalidOperation"));
        assert_eq!(ErrorKind::ExecutionError.to_string(), "ExecutionError");
    }

    #[test]
    fn test_sqlx_pool_error_is_execution() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
    }
}
