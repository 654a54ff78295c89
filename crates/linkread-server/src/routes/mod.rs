pub mod events;
pub mod health;
pub mod mcp;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Any GET that is not a health check opens the notification channel.
async fn fallback(method: Method, state: State<AppState>, headers: HeaderMap) -> Response {
    match method {
        Method::GET => events::handler(state, headers).await.into_response(),
        Method::POST => (StatusCode::NOT_FOUND, "POST to / or /mcp").into_response(),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn configure(state: AppState) -> Router {
    let body_limit = state.body_limit;
    Router::new()
        .merge(health::routes())
        .route("/", get(events::handler).post(mcp::handler))
        .route("/mcp", get(events::handler).post(mcp::handler))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tests::test_state;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        for uri in ["/health", "/healthz"] {
            let response = configure(test_state())
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["status"], "ok");
            assert!(body["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_ping_on_both_paths() {
        for uri in ["/mcp", "/"] {
            let (status, body) = post_json(
                configure(test_state()),
                uri,
                r#"{"jsonrpc":"2.0","id":42,"method":"ping"}"#,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"jsonrpc": "2.0", "id": 42, "result": {}}));
        }
    }

    #[tokio::test]
    async fn test_malformed_body_then_recovery() {
        let app = configure(test_state());
        let (status, body) = post_json(app.clone(), "/mcp", "{\"jsonrpc\": ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["jsonrpc"], "2.0");

        let (status, body) =
            post_json(app, "/mcp", r#"{"jsonrpc":"2.0","id":"x","method":"ping"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "x");
    }

    #[tokio::test]
    async fn test_body_above_axum_default_is_accepted() {
        let padding = "a".repeat(3 * 1024 * 1024);
        let body = json!({"jsonrpc": "2.0", "id": 11, "method": "ping", "params": {"padding": padding}});
        let (status, body) =
            post_json(configure(test_state()), "/mcp", &body.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 11);
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn test_oversized_body_gets_an_envelope() {
        let app = configure(test_state().with_body_limit(1024));
        let body = json!({"jsonrpc": "2.0", "id": 12, "method": "ping", "params": {"padding": "a".repeat(4096)}});
        let (status, body) = post_json(app.clone(), "/mcp", &body.to_string()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], -32600);

        let (status, _) = post_json(app, "/", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_method_status() {
        let (status, body) = post_json(
            configure(test_state()),
            "/mcp",
            r#"{"jsonrpc":"2.0","id":1,"method":"nope"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn test_tool_call_over_http() {
        let (status, body) = post_json(
            configure(test_state()),
            "/mcp",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"read_link","arguments":{"url":"https://example.com"}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(body["result"]["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn test_notification_channel_lifecycle() {
        let state = test_state().with_ping_interval(Duration::from_millis(20));
        let sessions = state.sessions.clone();

        let response = configure(state)
            .oneshot(
                Request::get("/")
                    .header(events::CLIENT_ID_HEADER, "client-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: initialized\n"));
        assert!(first.contains(r#""clientId":"client-7""#));
        assert!(sessions.contains("client-7"));

        let second = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert!(String::from_utf8(second.to_vec())
            .unwrap()
            .starts_with("event: ping\n"));

        drop(body);
        for _ in 0..50 {
            if !sessions.contains("client-7") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!sessions.contains("client-7"));
    }

    #[tokio::test]
    async fn test_any_get_opens_channel() {
        let response = configure(test_state())
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
    }
}
