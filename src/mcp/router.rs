//! Method router: maps JSON-RPC methods onto the tool dispatcher.

use serde_json::{json, Value};

use super::protocol::{JsonRpcError, PROTOCOL_VERSION};
use crate::tools::{Dispatcher, ToolCallRequest, ToolCallResult};

pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Route one request to its method handler.
pub async fn route_request(
    dispatcher: &Dispatcher,
    method: &str,
    params: Value,
) -> Result<Value, JsonRpcError> {
    match method {
        "initialize" => Ok(initialize_result(dispatcher)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools_list_result(dispatcher)),
        "tools/call" => {
            let request = parse_call_params(params)?;
            let result = dispatcher.dispatch(request).await;
            Ok(tool_call_result(&result))
        }
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn initialize_result(dispatcher: &Dispatcher) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {"listChanged": false}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
        },
        "instructions": dispatcher.catalog().generate_prompt(),
    })
}

fn tools_list_result(dispatcher: &Dispatcher) -> Value {
    let tools: Vec<Value> = dispatcher
        .list_tools()
        .iter()
        .map(|d| d.to_discovery_json())
        .collect();
    json!({ "tools": tools })
}

fn parse_call_params(params: Value) -> Result<ToolCallRequest, JsonRpcError> {
    if !params.is_object() {
        return Err(JsonRpcError::invalid_params("tools/call expects an object"));
    }
    serde_json::from_value(params).map_err(JsonRpcError::invalid_params)
}

/// MCP `tools/call` result: text content plus the structured envelope.
pub fn tool_call_result(result: &ToolCallResult) -> Value {
    let envelope = result.to_envelope();
    let text = serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": envelope,
        "isError": !result.is_success(),
    })
}
