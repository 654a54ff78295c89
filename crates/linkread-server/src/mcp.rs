//! MCP method dispatch.
//!
//! Every request gets exactly one response envelope. Dispatch runs in its own
//! task, so a panic anywhere below it becomes an internal-error envelope
//! instead of a dropped connection.

use linkread::models::tool::{ReadLinkArgs, Tool, ToolCall, ToolResponse, READ_LINK_TOOL};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::rpc::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "linkread";
pub const RESOURCE_URI: &str = "web://content";

pub async fn handle(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    let method = request.method.clone();
    let state = state.clone();

    match tokio::spawn(async move { dispatch(&state, request).await }).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(method = %method, error = %err, "request handler failed");
            let detail = if err.is_panic() {
                "the request handler panicked"
            } else {
                "the request handler was cancelled"
            };
            JsonRpcResponse::error(id, JsonRpcError::internal_error(detail))
        }
    }
}

async fn dispatch(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let JsonRpcRequest {
        id, method, params, ..
    } = request;
    tracing::debug!(method = %method, "dispatching");

    let result = match method.as_str() {
        "initialize" => Ok(initialize_result()),
        "notifications/initialized" => {
            tracing::info!("client completed the handshake");
            Ok(json!({}))
        }
        "ping" => Ok(json!({})),
        "resources/list" => Ok(resources_list()),
        "resources/read" => read_resource(params.as_ref()),
        "tools/list" => Ok(json!({ "tools": [Tool::read_link()] })),
        "tools/call" => call_tool(state, params).await,
        other => {
            tracing::warn!(method = other, "unknown method");
            Err(JsonRpcError::method_not_found(other))
        }
    };

    match result {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::error(id, error),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
            "logging": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn resources_list() -> Value {
    json!({
        "resources": [{
            "uri": RESOURCE_URI,
            "name": "Web Content Reader",
            "description": "Reads web pages, images, documents and videos behind a link",
            "mimeType": "text/plain"
        }]
    })
}

fn read_resource(params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let uri = params
        .and_then(|p| p.get("uri"))
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("missing required parameter 'uri'"))?;
    if uri != RESOURCE_URI {
        return Err(JsonRpcError::invalid_params(format!(
            "Unknown resource URI: {uri}"
        )));
    }
    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/plain",
            "text": format!(
                "Web Content Reader. Use the {READ_LINK_TOOL} tool to read a specific URL."
            )
        }]
    }))
}

async fn call_tool(state: &AppState, params: Option<Value>) -> Result<Value, JsonRpcError> {
    let call: ToolCall = params
        .ok_or_else(|| JsonRpcError::invalid_params("missing params"))
        .and_then(|p| {
            serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid tool call: {e}")))
        })?;

    if call.name != READ_LINK_TOOL {
        tracing::warn!(tool = %call.name, "unknown tool");
        return Err(JsonRpcError::new(
            codes::METHOD_NOT_FOUND,
            format!("Unknown tool: {}", call.name),
            None,
        ));
    }

    let args: ReadLinkArgs = serde_json::from_value(call.arguments).map_err(|e| {
        JsonRpcError::invalid_params(format!("invalid {READ_LINK_TOOL} arguments: {e}"))
    })?;
    if args.url.trim().is_empty() {
        return Err(JsonRpcError::invalid_params("'url' must not be empty"));
    }

    tracing::info!(tool = READ_LINK_TOOL, has_prompt = args.prompt.is_some(), "tool call");
    let read = state.reader.read(&args.url, args.prompt.as_deref());
    let response = match timeout(state.response_deadline, read).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                deadline_secs = state.response_deadline.as_secs(),
                "tool call hit the response deadline"
            );
            ToolResponse::error(format!(
                "Reading the link timed out after {} seconds. Try a smaller file or a more \
                 specific link.",
                state.response_deadline.as_secs()
            ))
        }
    };

    serde_json::to_value(response).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::LinkReader;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Reader whose behaviour is picked by the URL it receives
    pub(crate) struct ScriptedReader;

    #[async_trait]
    impl LinkReader for ScriptedReader {
        async fn read(&self, url: &str, prompt: Option<&str>) -> ToolResponse {
            match url {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    ToolResponse::success("late")
                }
                "boom" => panic!("reader exploded"),
                other => ToolResponse::success(format!("read {other} {}", prompt.unwrap_or("-"))),
            }
        }
    }

    pub(crate) fn test_state() -> AppState {
        AppState::new(Arc::new(ScriptedReader))
    }

    fn request(id: Value, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(Some(id), method, params)
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = handle(&test_state(), request(json!(1), "initialize", None)).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "linkread");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialized_notification_without_id() {
        let notification = JsonRpcRequest::new(None, "notifications/initialized", None);
        let response = handle(&test_state(), notification).await;
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tools_list_has_one_tool() {
        let response = handle(&test_state(), request(json!("t"), "tools/list", None)).await;
        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 1);
        assert_eq!(tools[0]["name"], "read_link");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["url"]));
        assert!(tools[0]["inputSchema"]["properties"]["prompt"].is_object());
    }

    #[tokio::test]
    async fn test_resources() {
        let state = test_state();
        let list = handle(&state, request(json!(1), "resources/list", None)).await;
        assert_eq!(list.result.unwrap()["resources"][0]["uri"], RESOURCE_URI);

        let read = handle(
            &state,
            request(json!(2), "resources/read", Some(json!({"uri": RESOURCE_URI}))),
        )
        .await;
        assert_eq!(read.result.unwrap()["contents"][0]["mimeType"], "text/plain");

        let unknown = handle(
            &state,
            request(json!(3), "resources/read", Some(json!({"uri": "file:///etc"}))),
        )
        .await;
        assert_eq!(unknown.error_code(), Some(codes::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_tool_call_passes_arguments() {
        let params = json!({"name": "read_link", "arguments": {"url": "https://a.example", "prompt": "sum"}});
        let response = handle(&test_state(), request(json!(9), "tools/call", Some(params))).await;
        assert_eq!(response.id, json!(9));
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "read https://a.example sum");
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let state = test_state();
        let method = handle(&state, request(json!(1), "tools/destroy", None)).await;
        assert_eq!(method.error_code(), Some(codes::METHOD_NOT_FOUND));

        let params = json!({"name": "write_link", "arguments": {"url": "x"}});
        let tool = handle(&state, request(json!(2), "tools/call", Some(params))).await;
        assert_eq!(tool.error_code(), Some(codes::METHOD_NOT_FOUND));
        assert_eq!(tool.id, json!(2));
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid_params() {
        let params = json!({"name": "read_link", "arguments": {}});
        let response = handle(&test_state(), request(json!(1), "tools/call", Some(params))).await;
        assert_eq!(response.error_code(), Some(codes::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_response_deadline_yields_error_result() {
        let state = test_state().with_response_deadline(Duration::from_millis(20));
        let params = json!({"name": "read_link", "arguments": {"url": "slow"}});
        let response = handle(&state, request(json!(1), "tools/call", Some(params))).await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let state = test_state();
        let params = json!({"name": "read_link", "arguments": {"url": "boom"}});
        let response = handle(&state, request(json!(5), "tools/call", Some(params))).await;
        assert_eq!(response.error_code(), Some(codes::INTERNAL_ERROR));
        assert_eq!(response.id, json!(5));

        let ping = handle(&state, request(json!(6), "ping", None)).await;
        assert!(ping.is_success());
    }
}
