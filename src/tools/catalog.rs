//! Tool catalog: typed descriptors and argument validation.
//!
//! Descriptors are registered once at startup and are immutable afterwards.
//! Discovery order is registration order.

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    /// Array of bind values: null, boolean, number or string.
    ScalarList,
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            ParamType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("expected string, got {}", value_type_name(value)))
                }
            }
            ParamType::Int => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(format!("expected integer, got {}", value_type_name(value)))
                }
            }
            ParamType::Float => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(format!("expected number, got {}", value_type_name(value)))
                }
            }
            ParamType::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("expected boolean, got {}", value_type_name(value)))
                }
            }
            ParamType::ScalarList => {
                if let Some(arr) = value.as_array() {
                    for (i, item) in arr.iter().enumerate() {
                        if item.is_array() || item.is_object() {
                            return Err(format!(
                                "expected scalar at index {}, got {}",
                                i,
                                value_type_name(item)
                            ));
                        }
                    }
                    Ok(())
                } else {
                    Err(format!("expected array, got {}", value_type_name(value)))
                }
            }
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.validate(value)
                }
            }
        }
    }

    /// Human-readable type name for prompt generation.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Int => "integer".to_string(),
            ParamType::Float => "number".to_string(),
            ParamType::Bool => "boolean".to_string(),
            ParamType::ScalarList => "scalar[]".to_string(),
            ParamType::Optional(inner) => format!("{}?", inner.display_name()),
        }
    }

    /// JSON Schema fragment for this type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::Float => json!({"type": "number"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::ScalarList => json!({
                "type": "array",
                "items": {"type": ["string", "number", "integer", "boolean", "null"]}
            }),
            ParamType::Optional(inner) => inner.json_schema(),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: ParamType::Optional(Box::new(param_type)),
            description: description.to_string(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }
}

// =============================================================================
// Tool descriptor
// =============================================================================

/// Complete tool metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamDef) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON Schema object describing the tool's arguments.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            let mut schema = p.param_type.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), Value::String(p.description.clone()));
                if let Some(default) = &p.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(p.name.clone(), schema);
            if p.is_required() {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Discovery form: `{name, description, inputSchema}`.
    pub fn to_discovery_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Generate a prompt line for this tool.
    ///
    /// Format: `- name(param1: type, param2?: type): description`
    pub fn to_prompt_line(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let optional = if p.is_required() { "" } else { "?" };
                format!("{}{}: {}", p.name, optional, p.param_type.display_name())
            })
            .collect();

        format!("- {}({}): {}", self.name, params.join(", "), self.description)
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog. Owns metadata, not implementations.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Empty and duplicate names are rejected.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if descriptor.name.is_empty() {
            return Err(Error::config("Tool name cannot be empty"));
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(Error::config(format!(
                "Tool '{}' is already registered",
                descriptor.name
            )));
        }
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    /// Get a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.entries
    }

    /// Validate arguments against a tool's parameter definitions.
    ///
    /// Reports the first missing required parameter (declaration order) as
    /// `MissingArgument`, then the first mistyped one as `InvalidArgument`.
    /// Unknown extra arguments are tolerated and returned for logging.
    pub fn validate_args(&self, name: &str, args: &Map<String, Value>) -> Result<Vec<String>> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| Error::unknown_tool(name))?;

        for param in &descriptor.parameters {
            let present = args.get(&param.name).is_some_and(|v| !v.is_null());
            if param.is_required() && !present {
                return Err(Error::missing_argument(param.name.clone()));
            }
        }

        let mut unknown = Vec::new();
        for (key, value) in args {
            match descriptor.parameters.iter().find(|p| &p.name == key) {
                Some(param) => {
                    if let Err(e) = param.param_type.validate(value) {
                        return Err(Error::invalid_argument(format!("'{}': {}", key, e)));
                    }
                }
                None => unknown.push(key.clone()),
            }
        }

        Ok(unknown)
    }

    /// Fill in default values for missing parameters.
    pub fn fill_defaults(&self, name: &str, args: &mut Map<String, Value>) -> Result<()> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| Error::unknown_tool(name))?;

        for param in &descriptor.parameters {
            if let Some(default) = &param.default {
                let absent = args.get(&param.name).map_or(true, Value::is_null);
                if absent {
                    args.insert(param.name.clone(), default.clone());
                }
            }
        }

        Ok(())
    }

    /// Generate formatted tool summary.
    pub fn generate_prompt(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        lines.push("Available tools:".to_string());
        for entry in &self.entries {
            lines.push(entry.to_prompt_line());
        }
        lines.join("\n")
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use pretty_assertions::assert_eq;

    fn sample_entry() -> ToolDescriptor {
        ToolDescriptor::new("run_read_query", "Execute a read-only query")
            .param(ParamDef::required("query", ParamType::String, "SQL to run"))
            .param(ParamDef::optional("params", ParamType::ScalarList, "Bind values"))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        assert!(catalog.has_tool("run_read_query"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);

        let entry = catalog.get("run_read_query").unwrap();
        assert_eq!(entry.description, "Execute a read-only query");
    }

    #[test]
    fn test_register_empty_or_duplicate_fails() {
        let mut catalog = ToolCatalog::new();
        assert!(catalog.register(ToolDescriptor::new("", "nameless")).is_err());

        catalog.register(sample_entry()).unwrap();
        assert!(catalog.register(sample_entry()).is_err());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut catalog = ToolCatalog::new();
        for name in ["zeta", "alpha", "mid"] {
            catalog.register(ToolDescriptor::new(name, "x")).unwrap();
        }
        let names: Vec<&str> = catalog.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_validate_args_valid() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let unknown = catalog
            .validate_args("run_read_query", &args(json!({"query": "SELECT 1", "params": [1, "a", null]})))
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_validate_args_missing_required() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let err = catalog.validate_args("run_read_query", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
        assert_eq!(err.message(), "query");

        let err = catalog
            .validate_args("run_read_query", &args(json!({"query": null})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
    }

    #[test]
    fn test_validate_args_wrong_type() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let err = catalog
            .validate_args("run_read_query", &args(json!({"query": 42})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.message().contains("expected string"));

        let err = catalog
            .validate_args("run_read_query", &args(json!({"query": "SELECT $1", "params": [[1]]})))
            .unwrap_err();
        assert!(err.message().contains("expected scalar at index 0"));
    }

    #[test]
    fn test_validate_args_unknown_param_tolerated() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        let unknown = catalog
            .validate_args("run_read_query", &args(json!({"query": "SELECT 1", "bogus": true})))
            .unwrap();
        assert_eq!(unknown, vec!["bogus".to_string()]);
    }

    #[test]
    fn test_validate_args_unknown_tool() {
        let catalog = ToolCatalog::new();
        let err = catalog.validate_args("nonexistent", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
    }

    #[test]
    fn test_fill_defaults() {
        let mut catalog = ToolCatalog::new();
        catalog
            .register(
                ToolDescriptor::new("get_table_count", "Count rows")
                    .param(ParamDef::required("table_name", ParamType::String, "Table"))
                    .param(
                        ParamDef::optional("schema", ParamType::String, "Schema")
                            .with_default(json!("public")),
                    ),
            )
            .unwrap();

        let mut params = args(json!({"table_name": "users"}));
        catalog.fill_defaults("get_table_count", &mut params).unwrap();
        assert_eq!(params["schema"], "public");

        let mut params = args(json!({"table_name": "users", "schema": "app"}));
        catalog.fill_defaults("get_table_count", &mut params).unwrap();
        assert_eq!(params["schema"], "app");
    }

    #[test]
    fn test_input_schema() {
        let schema = sample_entry().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["properties"]["query"]["description"], "SQL to run");
        assert_eq!(schema["properties"]["params"]["type"], "array");
    }

    #[test]
    fn test_discovery_json_fields() {
        let value = sample_entry().to_discovery_json();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["description", "inputSchema", "name"]);
    }

    #[test]
    fn test_prompt_line_format() {
        assert_eq!(
            sample_entry().to_prompt_line(),
            "- run_read_query(query: string, params?: scalar[]?): Execute a read-only query"
        );
    }

    #[test]
    fn test_generate_prompt() {
        let mut catalog = ToolCatalog::new();
        assert!(catalog.generate_prompt().is_empty());

        catalog.register(sample_entry()).unwrap();
        let prompt = catalog.generate_prompt();
        assert!(prompt.starts_with("Available tools:\n- run_read_query("));
    }

    #[test]
    fn test_param_type_scalar_list_validation() {
        let pt = ParamType::ScalarList;
        assert!(pt.validate(&json!([1, "a", true, null, 2.5])).is_ok());
        assert!(pt.validate(&json!([{"a": 1}])).is_err());
        assert!(pt.validate(&json!("not array")).is_err());
    }
}
