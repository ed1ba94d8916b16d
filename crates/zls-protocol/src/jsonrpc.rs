//! JSON-RPC 2.0 message types.
//!
//! Core request, response, and error types for JSON-RPC communication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard JSON-RPC error code: malformed request object.
pub const INVALID_REQUEST: i32 = -32600;
/// Standard JSON-RPC error code: method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Standard JSON-RPC error code: invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Standard JSON-RPC error code: internal server error.
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request message.
///
/// The `id` field is `None` for notifications.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    #[serde(rename = "jsonrpc", default)]
    pub _jsonrpc: String,

    /// Request identifier (integer or string; absent for notifications).
    pub id: Option<Value>,

    /// Method name to invoke.
    pub method: String,

    /// Method parameters.
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response message.
///
/// Either `result` or `error` is set, never both.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,

    /// Request identifier (matches the request's id).
    pub id: Option<Value>,

    /// Success result (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error result (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }

    /// Create a null result response (for methods that return nothing).
    pub fn null(id: Option<Value>) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(Value::Null), error: None }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Clone)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,

    /// Human-readable error message.
    pub message: String,

    /// Additional error data (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// The error sent for methods the server does not implement.
    pub fn not_implemented() -> Self {
        Self::new(METHOD_NOT_FOUND, "NotImplemented")
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_with_integer_id_parses() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "textDocument/hover",
            "params": {"x": 1}
        }))
        .unwrap();
        assert_eq!(req.id, Some(json!(7)));
        assert_eq!(req.method, "textDocument/hover");
    }

    #[test]
    fn notification_has_no_id() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "initialized"
        }))
        .unwrap();
        assert_eq!(req.id, None);
        assert_eq!(req.params, None);
    }

    #[test]
    fn null_response_serializes_result_null() {
        let value = serde_json::to_value(JsonRpcResponse::null(Some(json!(1)))).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 1, "result": null}));
    }

    #[test]
    fn error_response_shape() {
        let value = serde_json::to_value(JsonRpcResponse::error(
            Some(json!("a")),
            JsonRpcError::not_implemented(),
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": "a", "error": {"code": -32601, "message": "NotImplemented"}})
        );
    }
}
