// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the control-plane API (§4.7, §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ErrorCode;

/// `GET /healthz` — liveness probe, independent of auth.
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /sessions`
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.supervisor.list())
}

/// `GET /sessions/{id}`
pub async fn inspect_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.supervisor.inspect(&id) {
        Ok(view) => Json(view).into_response(),
        Err(code) => code.to_http_response(format!("no such session: {id}")).into_response(),
    }
}

/// `POST /sessions/{id}/controller/start`
pub async fn start_controller(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    accepted_or_error(state.supervisor.start(&id).await, &id)
}

/// `POST /sessions/{id}/controller/stop`
pub async fn stop_controller(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    accepted_or_error(state.supervisor.stop(&id).await, &id)
}

/// `POST /sessions/{id}/controller/restart`
pub async fn restart_controller(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    accepted_or_error(state.supervisor.restart(&id).await, &id)
}

fn accepted_or_error(result: Result<(), ErrorCode>, id: &str) -> axum::response::Response {
    match result {
        Ok(()) => (axum::http::StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": true }))).into_response(),
        Err(code) => code.to_http_response(format!("session {id}: {code}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub fingerprint: String,
    pub response: String,
    #[serde(rename = "oneShot")]
    pub one_shot: bool,
}

/// `POST /sessions/{id}/overrides` body `{fingerprint, response, oneShot}`.
pub async fn set_override(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> impl IntoResponse {
    if req.fingerprint.trim().is_empty() {
        return ErrorCode::ValidationError.to_http_response("fingerprint must not be empty").into_response();
    }
    match state.supervisor.register_override(&id, &req.fingerprint, req.response, req.one_shot) {
        Ok(()) => (axum::http::StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": true }))).into_response(),
        Err(code) => code.to_http_response(format!("session {id}: {code}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_tail")]
    pub tail: usize,
}

fn default_tail() -> usize {
    100
}

/// `GET /sessions/{id}/logs?tail=N`
pub async fn session_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    match state.supervisor.logs(&id, query.tail) {
        Ok(lines) => Json(lines).into_response(),
        Err(code) => code.to_http_response(format!("no such session: {id}")).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct ShutdownResponse {
    accepted: bool,
}

/// `POST /shutdown` — cancel the process-wide shutdown token.
pub async fn shutdown(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.shutdown.cancel();
    (axum::http::StatusCode::ACCEPTED, Json(ShutdownResponse { accepted: true }))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
