// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use yesman::api::{build_router, AppState};
use yesman::bus::EventBus;
use yesman::config::Config;
use yesman::detector::pattern::PatternLibrary;
use yesman::error::ExitCode;
use yesman::pane::tmux::TmuxBackend;
use yesman::responder::{LearnerStore, Responder, ResponderConfig};
use yesman::supervisor::{Supervisor, SupervisorConfig};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(ExitCode::ConfigError as i32);
    }

    yesman::logging::init(&config);

    match run(config).await {
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(ExitCode::ConfigError as i32);
        }
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let library = match &config.pattern_dir {
        Some(dir) => PatternLibrary::load_dir(dir, config.detect_lines)
            .map_err(|e| anyhow::anyhow!("pattern library invalid ({dir:?}): {e}"))?,
        None => PatternLibrary::embedded_default(config.detect_lines)?,
    };
    let library = Arc::new(library);

    let shutdown = CancellationToken::new();

    std::fs::create_dir_all(&config.store_dir)
        .map_err(|e| anyhow::anyhow!("creating store dir {:?}: {e}", config.store_dir))?;
    let store = match LearnerStore::open(
        config.store_dir.clone(),
        config.max_records_per_fingerprint,
        Duration::from_secs(5),
        shutdown.clone(),
    ) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "learner store corrupted beyond recovery");
            return Ok(ExitCode::StoreCorrupted);
        }
    };
    let responder = Arc::new(Responder::new(store, ResponderConfig::from_config(&config)));

    let backend = Arc::new(TmuxBackend::new(config.tmux_socket.clone()));
    let bus = EventBus::new(config.bus_queue_depth);
    let supervisor = Supervisor::new(backend, library, responder, bus, SupervisorConfig::from_config(&config));

    let reconcile_sup = Arc::clone(&supervisor);
    let reconcile_shutdown = shutdown.clone();
    let reconcile_task = tokio::spawn(reconcile_sup.run_reconciliation(reconcile_shutdown));

    let state = Arc::new(AppState { supervisor: Arc::clone(&supervisor), auth_token: config.auth_token.clone(), shutdown: shutdown.clone() });
    let router = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to bind control-plane listener on {addr}");
            return Ok(ExitCode::BackendUnavailable);
        }
    };
    info!("yesman listening on {addr}");

    spawn_signal_handler(shutdown.clone());

    let serve_shutdown = shutdown.clone();
    let result = axum::serve(listener, router).with_graceful_shutdown(async move { serve_shutdown.cancelled().await }).await;
    if let Err(e) = result {
        error!(error = %e, "control-plane server error");
    }

    supervisor.shutdown_all().await;
    reconcile_task.abort();

    Ok(ExitCode::Clean)
}

/// Cancel the shutdown token on SIGTERM/SIGINT, mirroring the reference
/// codebase's own signal handling.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { match &mut sigterm { Some(s) => s.recv().await, None => std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { match &mut sigint { Some(s) => s.recv().await, None => std::future::pending().await } } => {
                info!("received SIGINT");
            }
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { match &mut sigterm { Some(s) => s.recv().await, None => std::future::pending().await } } => {
                warn!("received signal again, forcing exit");
                std::process::exit(130);
            }
            _ = async { match &mut sigint { Some(s) => s.recv().await, None => std::future::pending().await } } => {
                warn!("received signal again, forcing exit");
                std::process::exit(130);
            }
        }
    });
}
