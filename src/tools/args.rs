//! Typed accessors over a validated tool argument map.

use crate::types::{Error, Result};
use serde_json::{Map, Value};

/// Arguments of one tool call, already checked against the descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(Error::invalid_argument(format!("'{}' must be a string", key))),
            None => Err(Error::missing_argument(key)),
        }
    }

    pub fn opt_str_field(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            Some(_) => self.str_field(key).map(Some),
            None => Ok(None),
        }
    }

    /// Positional bind values; absent means none.
    pub fn bind_values(&self, key: &str) -> Result<Vec<Value>> {
        match self.get(key) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(Error::invalid_argument(format!("'{}' must be an array", key))),
            None => Ok(Vec::new()),
        }
    }
}
