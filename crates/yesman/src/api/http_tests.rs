// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::super::build_router;
use super::super::AppState;
use crate::bus::EventBus;
use crate::collector::CollectorConfig;
use crate::controller::ControllerConfig;
use crate::detector::pattern::PatternLibrary;
use crate::pane::fake::FakeBackend;
use crate::responder::{LearnerStore, Responder, ResponderConfig};
use crate::supervisor::{SessionSpec, Supervisor, SupervisorConfig};

fn test_state() -> Arc<AppState> {
    let dir = tempdir().expect("tempdir");
    let store = LearnerStore::open(dir.path().to_path_buf(), 500, Duration::from_secs(60), CancellationToken::new())
        .expect("open store");
    std::mem::forget(dir);
    let responder = Arc::new(Responder::new(store, ResponderConfig::default()));
    let library = Arc::new(PatternLibrary::empty(40));
    let backend = Arc::new(FakeBackend::new());
    let bus = EventBus::new(64);
    let config = SupervisorConfig {
        collector: CollectorConfig {
            base_interval: Duration::from_millis(20),
            max_interval: Duration::from_millis(200),
            max_lines: 40,
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
        },
        controller: ControllerConfig {
            debounce: Duration::from_millis(20),
            cooldown: Duration::from_millis(20),
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
            log_ring_lines: 64,
        },
        reconcile_interval: Duration::from_secs(30),
        shutdown_grace: Duration::from_millis(200),
        worker_pool_size: 4,
    };
    let supervisor = Supervisor::new(backend, library, responder, bus, config);
    Arc::new(AppState { supervisor, auth_token: None, shutdown: CancellationToken::new() })
}

#[tokio::test]
async fn healthz_reports_ok() {
    let state = test_state();
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.get("/healthz").await;
    resp.assert_status(StatusCode::OK);
    resp.assert_json(&serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn inspect_unknown_session_404s() {
    let state = test_state();
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.get("/sessions/nope").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_unknown_session_404s() {
    let state = test_state();
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.post("/sessions/nope/controller/start").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_then_list_then_stop() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.post("/sessions/s1/controller/start").await;
    resp.assert_status(StatusCode::ACCEPTED);

    let resp = server.get("/sessions").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body.as_array().expect("array").len(), 1);

    let resp = server.post("/sessions/s1/controller/stop").await;
    resp.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn stop_before_start_is_not_running() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.post("/sessions/s1/controller/stop").await;
    resp.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "NOT_RUNNING");
}

#[tokio::test]
async fn set_override_rejects_empty_fingerprint() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server
        .post("/sessions/s1/overrides")
        .json(&serde_json::json!({ "fingerprint": "  ", "response": "y", "oneShot": true }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn set_override_accepted_for_registered_session() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server
        .post("/sessions/s1/overrides")
        .json(&serde_json::json!({ "fingerprint": "abc123", "response": "y", "oneShot": true }))
        .await;
    resp.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn logs_for_session_without_controller_404s() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.get("/sessions/s1/logs").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_after_start_returns_empty_ring() {
    let state = test_state();
    state.supervisor.register(SessionSpec::new("s1", 0, 0)).expect("register");
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    server.post("/sessions/s1/controller/start").await.assert_status(StatusCode::ACCEPTED);

    let resp = server.get("/sessions/s1/logs?tail=10").await;
    resp.assert_status(StatusCode::OK);
    let lines: Vec<String> = resp.json();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn shutdown_cancels_token() {
    let state = test_state();
    let shutdown = state.shutdown.clone();
    let server = axum_test::TestServer::new(build_router(state)).expect("server");

    let resp = server.post("/shutdown").await;
    resp.assert_status(StatusCode::ACCEPTED);
    assert!(shutdown.is_cancelled());
}
