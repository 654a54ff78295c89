use axum::{extract::rejection::BytesRejection, extract::State, http::StatusCode, Json};
use bytes::Bytes;

use crate::rpc::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::state::AppState;

/// One JSON-RPC envelope in, one out. The body is read raw so that invalid
/// JSON, or a body that could not be buffered at all, still gets a
/// protocol-level answer.
pub async fn handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(
                status = %rejection.status(),
                limit = state.body_limit,
                "rejected request body"
            );
            let response = JsonRpcResponse::error(
                None,
                JsonRpcError::invalid_request(rejection.body_text()),
            );
            return (rejection.status(), Json(response));
        }
    };

    let response = match JsonRpcRequest::parse(&body) {
        Ok(request) => crate::mcp::handle(&state, request).await,
        Err(response) => {
            tracing::warn!(bytes = body.len(), "rejected malformed envelope");
            response
        }
    };

    let status = match response.error_code() {
        None => StatusCode::OK,
        Some(codes::PARSE_ERROR | codes::INVALID_REQUEST) => StatusCode::BAD_REQUEST,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(response))
}
