// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use super::{StreamMessage, StreamQuery};
use crate::bus::EventBus;
use crate::collector::CollectorConfig;
use crate::controller::{ControllerConfig, ControllerState};
use crate::detector::pattern::PatternLibrary;
use crate::event::Event;
use crate::pane::fake::FakeBackend;
use crate::responder::{LearnerStore, Responder, ResponderConfig};
use crate::supervisor::{Supervisor, SupervisorConfig};

fn test_state(auth_token: Option<&str>) -> Arc<super::super::AppState> {
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
    Arc::new(super::super::AppState { supervisor, auth_token: auth_token.map(str::to_owned), shutdown: CancellationToken::new() })
}

fn sample_event() -> Event {
    Event::controller_state_changed("s1", ControllerState::Idle, ControllerState::Watching)
}

#[test]
fn query_with_no_filters_matches_everything() {
    let query = StreamQuery::default();
    assert!(query.matches(&sample_event()));
    assert!(query.matches(&Event::subscriber_lagged(1)));
}

#[test]
fn query_filters_by_session_id() {
    let mut query = StreamQuery::default();
    query.session_id = Some("s2,s3".to_owned());
    assert!(!query.matches(&sample_event()));
    query.session_id = Some("s1,s3".to_owned());
    assert!(query.matches(&sample_event()));
}

#[test]
fn query_session_filter_excludes_session_less_events() {
    let mut query = StreamQuery::default();
    query.session_id = Some("s1".to_owned());
    assert!(!query.matches(&Event::subscriber_lagged(1)));
}

#[test]
fn query_filters_by_kind() {
    let mut query = StreamQuery::default();
    query.kind = Some("prompt_detected,decision_made".to_owned());
    assert!(!query.matches(&sample_event()));
    query.kind = Some("controller_state_changed".to_owned());
    assert!(query.matches(&sample_event()));
}

#[test]
fn stream_message_envelope_carries_kind_session_and_timestamp() {
    let event = sample_event();
    let at = event.at_ms();
    let msg = StreamMessage::from(event);
    let json = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(json["kind"], "controller_state_changed");
    assert_eq!(json["sessionId"], "s1");
    assert_eq!(json["at"], at);
}

#[test]
fn stream_message_for_bus_level_event_has_no_session_id() {
    let msg = StreamMessage::from(Event::subscriber_lagged(7));
    let json = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(json["kind"], "subscriber_lagged");
    assert!(json["sessionId"].is_null());
}

#[tokio::test]
async fn stream_rejects_upgrade_with_wrong_token() {
    let state = test_state(Some("secret"));
    let server = axum_test::TestServer::new(super::super::build_router(state)).expect("server");

    let resp = server.get("/stream?token=wrong").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stream_rejects_upgrade_with_missing_token() {
    let state = test_state(Some("secret"));
    let server = axum_test::TestServer::new(super::super::build_router(state)).expect("server");

    let resp = server.get("/stream").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}
