//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod codes {
    /// Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new<S: Into<String>>(id: Option<Value>, method: S, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id,
            method: method.into(),
            params,
        }
    }

    /// Parse one inbound envelope.
    ///
    /// Invalid JSON is a parse error. Valid JSON that is not a request object is
    /// an invalid request, answered with whatever `id` could be recovered.
    pub fn parse(body: &[u8]) -> Result<Self, JsonRpcResponse> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string()))
        })?;
        let id = value.get("id").cloned().filter(|id| !id.is_null());
        serde_json::from_value(value)
            .map_err(|e| JsonRpcResponse::error(id, JsonRpcError::invalid_request(e.to_string())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new<S: Into<String>>(code: i32, message: S, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error<S: Into<String>>(detail: S) -> Self {
        Self::new(
            codes::PARSE_ERROR,
            "Parse error",
            Some(Value::String(detail.into())),
        )
    }

    pub fn invalid_request<S: Into<String>>(detail: S) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            "Invalid Request",
            Some(Value::String(detail.into())),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
            None,
        )
    }

    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self::new(codes::INVALID_PARAMS, message, None)
    }

    pub fn internal_error<S: Into<String>>(detail: S) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            "Internal error",
            Some(Value::String(detail.into())),
        )
    }
}

/// Outbound envelope. `id` is always present and `null` when the request had none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request() {
        let request = JsonRpcRequest::parse(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method, "ping");
        assert_eq!(request.params, None);
    }

    #[test]
    fn test_malformed_body_is_parse_error_with_null_id() {
        let response = JsonRpcRequest::parse(b"{not json").unwrap_err();
        assert_eq!(response.error_code(), Some(codes::PARSE_ERROR));
        assert_eq!(response.id, Value::Null);
    }

    #[test]
    fn test_missing_method_is_invalid_request_keeping_id() {
        let response = JsonRpcRequest::parse(br#"{"jsonrpc":"2.0","id":"abc"}"#).unwrap_err();
        assert_eq!(response.error_code(), Some(codes::INVALID_REQUEST));
        assert_eq!(response.id, json!("abc"));
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_value(JsonRpcResponse::success(Some(json!(1)), json!({}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));

        let err = serde_json::to_value(JsonRpcResponse::error(
            None,
            JsonRpcError::method_not_found("nope"),
        ))
        .unwrap();
        assert_eq!(
            err,
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32601, "message": "Method not found: nope"}
            })
        );
    }
}
