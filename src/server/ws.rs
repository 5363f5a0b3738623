//! WebSocket log streaming
//!
//! Pushes pipeline log events to any number of observers. A new connection
//! gets a welcome status message and the recent history, then live events in
//! emission order. Client disconnects never affect running jobs.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::types::LogEvent;

use super::AppState;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

pub async fn logs_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_logs_socket(socket, state))
}

fn envelope(kind: &str, data: serde_json::Value) -> String {
    json!({
        "type": kind,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

fn log_payload(event: &LogEvent) -> serde_json::Value {
    json!({
        "level": event.level.as_str(),
        "message": event.message,
        "formatted_message": event.formatted_message,
        "timestamp": event.timestamp.to_rfc3339(),
    })
}

async fn send_text(sender: &mut WsSender, text: String) -> Result<(), axum::Error> {
    sender.send(Message::Text(text.into())).await
}

async fn handle_logs_socket(socket: WebSocket, state: AppState) {
    debug!("log observer connected");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the catch-up send so no event can fall in between
    let (history, mut rx) = state.bus.subscribe();

    let welcome = envelope(
        "status",
        json!({ "message": "Connected to DealSense logs", "connected": true }),
    );
    if send_text(&mut sender, welcome).await.is_err() {
        return;
    }

    for event in &history {
        if send_text(&mut sender, envelope("log", log_payload(event))).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            published = rx.recv() => match published {
                Ok(event) => {
                    if send_text(&mut sender, envelope("log", log_payload(&event))).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    let notice = envelope(
                        "status",
                        json!({ "message": format!("{skipped} log events dropped (slow consumer)") }),
                    );
                    if send_text(&mut sender, notice).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = next_message(&mut receiver) => match incoming {
                Some(text) => {
                    if handle_client_message(&mut sender, &state, &text).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    debug!("log observer disconnected");
}

/// Next text frame from the client, or None when the connection is done.
async fn next_message(receiver: &mut WsReceiver) -> Option<String> {
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => return Some(text.to_string()),
            Some(Ok(Message::Close(_))) | None => return None,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return None,
        }
    }
}

/// React to a client message. An Err means the reply could not be delivered
/// and the connection should be dropped.
async fn handle_client_message(
    sender: &mut WsSender,
    state: &AppState,
    text: &str,
) -> Result<(), axum::Error> {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            let reply = envelope("error", json!({ "error": "Invalid JSON message" }));
            return send_text(sender, reply).await;
        }
    };

    match parsed.get("type").and_then(|t| t.as_str()) {
        Some("ping") => {
            let reply = envelope("pong", json!({ "timestamp": Utc::now().to_rfc3339() }));
            send_text(sender, reply).await
        }
        Some("request_history") => {
            let logs: Vec<serde_json::Value> =
                state.bus.history().iter().map(log_payload).collect();
            let reply = envelope("history", json!({ "logs": logs }));
            send_text(sender, reply).await
        }
        // Unknown message types are ignored
        _ => Ok(()),
    }
}
