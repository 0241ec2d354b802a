// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::{build_router, AppState};
use crate::bus::EventBus;
use crate::collector::CollectorConfig;
use crate::controller::ControllerConfig;
use crate::detector::pattern::PatternLibrary;
use crate::pane::fake::FakeBackend;
use crate::responder::{LearnerStore, Responder, ResponderConfig};
use crate::supervisor::{Supervisor, SupervisorConfig};

fn test_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
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
    }
}

fn test_state(auth_token: Option<&str>) -> Arc<AppState> {
    let dir = tempdir().expect("tempdir");
    let store = LearnerStore::open(dir.path().to_path_buf(), 500, Duration::from_secs(60), CancellationToken::new())
        .expect("open store");
    std::mem::forget(dir);
    let responder = Arc::new(Responder::new(store, ResponderConfig::default()));
    let library = Arc::new(PatternLibrary::empty(40));
    let backend = Arc::new(FakeBackend::new());
    let bus = EventBus::new(64);
    let supervisor = Supervisor::new(backend, library, responder, bus, test_supervisor_config());
    Arc::new(AppState { supervisor, auth_token: auth_token.map(str::to_owned), shutdown: CancellationToken::new() })
}

#[tokio::test]
async fn healthz_is_exempt_from_auth() {
    let app = build_router(test_state(Some("secret")));
    let server = axum_test::TestServer::new(app).expect("server");

    let resp = server.get("/healthz").await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn protected_route_requires_bearer_when_configured() {
    let app = build_router(test_state(Some("secret")));
    let server = axum_test::TestServer::new(app).expect("server");

    let resp = server.get("/sessions").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server.get("/sessions").add_header("authorization", "Bearer secret").await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn list_sessions_empty_by_default() {
    let app = build_router(test_state(None));
    let server = axum_test::TestServer::new(app).expect("server");

    let resp = server.get("/sessions").await;
    resp.assert_status(StatusCode::OK);
    resp.assert_json(&serde_json::json!([]));
}

#[tokio::test]
async fn unknown_session_404s() {
    let app = build_router(test_state(None));
    let server = axum_test::TestServer::new(app).expect("server");

    let resp = server.get("/sessions/nope").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}
