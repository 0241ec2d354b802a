// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane API (C7): HTTP + WebSocket surface over the [`Supervisor`].
//! Every handler is a thin translation from an HTTP/WS request to a
//! `Supervisor` call and back — no state lives in this module beyond the
//! `AppState` handle.

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::error::ErrorCode;
use crate::supervisor::Supervisor;

/// Top-level error response envelope shared across HTTP and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorCode {
    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body(message) }))
    }
}

/// Shared application state passed to every handler via the axum `State`
/// extractor.
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub auth_token: Option<String>,
    pub shutdown: CancellationToken,
}

/// Build the axum `Router` wiring every control-plane route.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz))
        .route("/sessions", get(http::list_sessions))
        .route("/sessions/{id}", get(http::inspect_session))
        .route("/sessions/{id}/controller/start", post(http::start_controller))
        .route("/sessions/{id}/controller/stop", post(http::stop_controller))
        .route("/sessions/{id}/controller/restart", post(http::restart_controller))
        .route("/sessions/{id}/overrides", post(http::set_override))
        .route("/sessions/{id}/logs", get(http::session_logs))
        .route("/stream", get(ws::stream_handler))
        .route("/shutdown", post(http::shutdown))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
