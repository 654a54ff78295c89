use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::state::AppState;

pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// A server-sent event stream fed through a channel
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

fn format_event(name: &str, data: &Value) -> String {
    format!("event: {name}\ndata: {data}\n\n")
}

/// Opens the notification channel: an `initialized` event, then a `ping`
/// every interval until the client goes away.
pub async fn handler(State(state): State<AppState>, headers: HeaderMap) -> SseResponse {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (tx, rx) = mpsc::channel(16);
    let session = state.sessions.connect(&client_id);
    let period = state.ping_interval;

    tokio::spawn(async move {
        // Dropping the guard removes the registry entry
        let _session = session;

        let initialized = json!({ "type": "initialized", "clientId": client_id });
        if tx.send(format_event("initialized", &initialized)).await.is_err() {
            return;
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ping = json!({ "type": "ping", "timestamp": Utc::now().timestamp_millis() });
                    if tx.send(format_event("ping", &ping)).await.is_err() {
                        break;
                    }
                }
                _ = tx.closed() => break,
            }
        }
    });

    SseResponse::new(ReceiverStream::new(rx))
}
