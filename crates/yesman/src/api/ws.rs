// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /stream`: push channel over the event bus (§4.8, §6). Framed as a
//! WebSocket upgrade rather than SSE, the framing the reference control
//! plane already uses for its own push channel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::auth::validate_bearer_token;
use super::AppState;
use crate::bus::Subscription;
use crate::event::Event;

/// Optional filter applied client-side to the stream. Both are
/// comma-separated lists; an absent/empty filter passes everything.
#[derive(Debug, Deserialize, Default)]
pub struct StreamQuery {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl StreamQuery {
    fn session_ids(&self) -> Vec<&str> {
        self.session_id.as_deref().map(|s| s.split(',').collect()).unwrap_or_default()
    }

    fn kinds(&self) -> Vec<&str> {
        self.kind.as_deref().map(|s| s.split(',').collect()).unwrap_or_default()
    }

    fn matches(&self, event: &Event) -> bool {
        let sessions = self.session_ids();
        if !sessions.is_empty() && !event.session_id().is_some_and(|id| sessions.contains(&id)) {
            return false;
        }
        let kinds = self.kinds();
        if !kinds.is_empty() && !kinds.contains(&event.kind()) {
            return false;
        }
        true
    }
}

/// Wire envelope for one pushed event (§6: `{kind, sessionId, payload, at}`).
#[derive(Debug, Serialize)]
struct StreamMessage {
    kind: &'static str,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    payload: Event,
    at: u64,
}

impl From<Event> for StreamMessage {
    fn from(event: Event) -> Self {
        Self { kind: event.kind(), session_id: event.session_id().map(str::to_owned), at: event.at_ms(), payload: event }
    }
}

/// `GET /stream` upgrade handler. Since a browser cannot set an
/// `Authorization` header on a WebSocket handshake, auth (when configured)
/// is instead checked from the `?token=` query parameter.
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if let Err(code) = validate_bearer_token(query.token.as_deref(), state.auth_token.as_deref()) {
        return code.to_http_response("unauthorized").into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(state, query, socket)).into_response()
}

async fn handle_connection(state: Arc<AppState>, query: StreamQuery, mut socket: WebSocket) {
    let mut sub: Subscription = state.supervisor.bus().subscribe();

    loop {
        tokio::select! {
            event = sub.recv() => {
                let Some(event) = event else { return };
                if !query.matches(&event) {
                    continue;
                }
                let terminal = matches!(event, Event::SubscriberLagged { .. });
                let msg = StreamMessage::from(event);
                let Ok(text) = serde_json::to_string(&msg) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
                if terminal {
                    return;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(e)) => {
                        debug!(error = %e, "stream: client socket error");
                        return;
                    }
                    // Clients don't send anything meaningful on this channel; ignore.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
