//! Tool call request and result envelopes.

use crate::types::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An incoming call: tool name plus argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments: Some(arguments),
        }
    }
}

/// Failure half of [`ToolCallResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one dispatch. Exactly one of payload or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallResult {
    Success(Value),
    Failure(ToolFailure),
}

impl ToolCallResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure(ToolFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.kind),
        }
    }

    /// Wire envelope: the payload itself, or `{error: {kind, message}}`.
    pub fn to_envelope(&self) -> Value {
        match self {
            Self::Success(payload) => payload.clone(),
            Self::Failure(f) => json!({
                "error": {
                    "kind": f.kind,
                    "message": f.message,
                }
            }),
        }
    }
}

impl From<Error> for ToolCallResult {
    fn from(err: Error) -> Self {
        Self::failure(err.kind(), err.message())
    }
}
