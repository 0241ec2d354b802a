// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor / Registry (C6): owns the set of registered [`SessionSpec`]s
//! and the active [`ControllerHandle`]s wired to them, runs the
//! reconciliation loop that keeps the two in sync with the underlying
//! multiplexer, and is the only thing allowed to create or destroy a
//! controller. The control-plane API (C7) talks to a [`Supervisor`]; it
//! never touches a controller directly.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::{self, ControllerConfig, ControllerHandle, ControllerState, SessionView};
use crate::detector::pattern::PatternLibrary;
use crate::collector::CollectorConfig;
use crate::error::ErrorCode;
use crate::bus::EventBus;
use crate::pane::{PaneBackend, PaneRef};
use crate::responder::{ContextKey, Responder};

/// One window of a [`SessionSpec`], as known at registration time.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub index: u32,
    pub panes: Vec<u32>,
}

/// Static description of a session to supervise (§3 `SessionSpec`).
/// Immutable after registration; the only mutable state tied to a session
/// lives in its [`ControllerHandle`].
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub session_id: String,
    pub project: String,
    pub windows: Vec<WindowSpec>,
    pub start_dir: Option<PathBuf>,
    pub before_commands: Vec<String>,
}

impl SessionSpec {
    /// A spec watching a single pane, `project` defaulting to the session id
    /// itself (the common case: one project per tmux session).
    pub fn new(session_id: impl Into<String>, window: u32, pane: u32) -> Self {
        let session_id = session_id.into();
        Self {
            project: session_id.clone(),
            session_id,
            windows: vec![WindowSpec { index: window, panes: vec![pane] }],
            start_dir: None,
            before_commands: Vec::new(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// The pane this spec's controller watches: the first pane of the first
    /// window. Multi-pane/multi-window sessions beyond that are metadata
    /// only — pane selection itself is out of this supervisor's scope.
    pub fn primary_pane(&self) -> Option<PaneRef> {
        let window = self.windows.first()?;
        let pane = window.panes.first()?;
        Some(PaneRef::new(self.session_id.clone(), window.index, *pane))
    }

    fn context(&self) -> ContextKey {
        ContextKey::new(self.project.clone(), self.session_id.clone())
    }
}

/// Tunables the supervisor needs beyond what it hands down to controllers.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub collector: CollectorConfig,
    pub controller: ControllerConfig,
    pub reconcile_interval: Duration,
    pub shutdown_grace: Duration,
    pub worker_pool_size: usize,
}

impl SupervisorConfig {
    pub fn from_config(config: &Config) -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            collector: CollectorConfig {
                base_interval: config.poll_interval(),
                max_interval: config.poll_interval_max(),
                max_lines: config.detect_lines,
                backoff_base: config.backoff_base(),
                backoff_cap: config.backoff_cap(),
            },
            controller: ControllerConfig {
                debounce: config.debounce(),
                cooldown: config.cooldown(),
                backoff_base: config.backoff_base(),
                backoff_cap: config.backoff_cap(),
                log_ring_lines: 200,
            },
            reconcile_interval: config.reconcile_interval(),
            shutdown_grace: config.shutdown_grace(),
            worker_pool_size: (cpus * 2).min(32),
        }
    }
}

/// Bounded pool shared by long-running supervisor-scheduled tasks
/// (reconciliation's `enumerate()`, persisting learner state). Session
/// controllers never draw from this pool — each owns its own mailbox task.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(size.max(1))) }
    }

    /// Acquire a slot. Returns `None` only if the pool has been shut down
    /// (never happens in this process's lifetime — the semaphore is never
    /// closed), in which case the caller should run uncontended rather than
    /// block forever.
    pub async fn acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }
}

struct Registry {
    specs: HashMap<String, SessionSpec>,
    controllers: HashMap<String, ControllerHandle>,
}

/// Supervisor / Registry (C6). Process-wide; the sole owner of the session
/// id → controller mapping.
pub struct Supervisor {
    backend: Arc<dyn PaneBackend>,
    library: Arc<PatternLibrary>,
    responder: Arc<Responder>,
    bus: EventBus,
    config: SupervisorConfig,
    pool: WorkerPool,
    registry: Mutex<Registry>,
}

impl Supervisor {
    pub fn new(
        backend: Arc<dyn PaneBackend>,
        library: Arc<PatternLibrary>,
        responder: Arc<Responder>,
        bus: EventBus,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let pool = WorkerPool::new(config.worker_pool_size);
        Arc::new(Self {
            backend,
            library,
            responder,
            bus,
            config,
            pool,
            registry: Mutex::new(Registry { specs: HashMap::new(), controllers: HashMap::new() }),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register a new [`SessionSpec`]. Does not itself spawn a controller —
    /// the reconciliation loop (or an explicit `start`) does that once the
    /// underlying pane is confirmed live.
    pub fn register(&self, spec: SessionSpec) -> Result<(), ErrorCode> {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if registry.specs.contains_key(&spec.session_id) {
            return Err(ErrorCode::Conflict);
        }
        registry.specs.insert(spec.session_id.clone(), spec);
        Ok(())
    }

    /// Tear down a session entirely: stop its controller (if any) and
    /// forget its spec. Idempotent.
    pub async fn teardown(&self, id: &str) -> Result<(), ErrorCode> {
        let (spec_existed, handle) = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let spec_existed = registry.specs.remove(id).is_some();
            (spec_existed, registry.controllers.remove(id))
        };
        if let Some(handle) = handle {
            handle.stop_unconditionally().await;
        }
        if spec_existed { Ok(()) } else { Err(ErrorCode::NotFound) }
    }

    pub fn list(&self) -> Vec<SessionView> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.controllers.values().map(ControllerHandle::view).collect()
    }

    pub fn inspect(&self, id: &str) -> Result<SessionView, ErrorCode> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.controllers.get(id).map(ControllerHandle::view).ok_or(ErrorCode::NotFound)
    }

    pub fn logs(&self, id: &str, tail: usize) -> Result<Vec<String>, ErrorCode> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.controllers.get(id).map(|h| h.logs(tail)).ok_or(ErrorCode::NotFound)
    }

    /// §4.7 "Set override": pins a response for `fingerprint` in the
    /// session's `(project, session)` context.
    pub fn register_override(&self, id: &str, fingerprint: &str, response: String, one_shot: bool) -> Result<(), ErrorCode> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let spec = registry.specs.get(id).ok_or(ErrorCode::NotFound)?;
        self.responder.overrides().set(&spec.context(), fingerprint, response, one_shot);
        Ok(())
    }

    fn spawn_for_spec(&self, spec: &SessionSpec) -> Result<ControllerHandle, ErrorCode> {
        let pane = spec.primary_pane().ok_or(ErrorCode::ValidationError)?;
        let handle = controller::spawn(
            spec.session_id.clone(),
            spec.context(),
            pane,
            Arc::clone(&self.backend),
            self.config.collector,
            Arc::clone(&self.library),
            Arc::clone(&self.responder),
            self.bus.clone(),
            self.config.controller,
        );
        Ok(handle)
    }

    /// §4.7 "Start controller": creates the controller on first start,
    /// rejecting with `Conflict` if one is already live.
    pub async fn start(&self, id: &str) -> Result<(), ErrorCode> {
        let handle = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let Some(spec) = registry.specs.get(id).cloned() else {
                return Err(ErrorCode::NotFound);
            };
            if let Some(existing) = registry.controllers.get(id) {
                existing.clone()
            } else {
                drop(registry);
                let handle = self.spawn_for_spec(&spec)?;
                let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.controllers.insert(id.to_string(), handle.clone());
                handle
            }
        };
        handle.start().await
    }

    /// §4.7 "Stop controller".
    pub async fn stop(&self, id: &str) -> Result<(), ErrorCode> {
        let handle = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.controllers.get(id).cloned()
        };
        match handle {
            Some(handle) => handle.stop().await,
            None => {
                let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
                if registry.specs.contains_key(id) { Err(ErrorCode::NotRunning) } else { Err(ErrorCode::NotFound) }
            }
        }
    }

    /// §4.7 "Restart controller": stop if running, then start.
    pub async fn restart(&self, id: &str) -> Result<(), ErrorCode> {
        let _ = self.stop(id).await;
        self.start(id).await
    }

    /// §4.6 reconciliation loop: register any live session the registry
    /// doesn't yet know about (this is how a `SessionSpec` gets registered
    /// "at boot" — and for any tmux session created afterward, since the
    /// control plane exposes no explicit register operation), keep every
    /// registered spec with a live underlying pane in a non-terminal
    /// controller state, and stop controllers whose underlying pane has
    /// disappeared.
    async fn reconcile(&self) {
        let _permit = self.pool.acquire().await;
        let sessions = match self.backend.enumerate().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "reconciliation: backend enumerate failed");
                return;
            }
        };

        {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            for session in &sessions {
                if registry.specs.contains_key(&session.session) {
                    continue;
                }
                let windows = session
                    .windows
                    .iter()
                    .map(|w| WindowSpec { index: w.index, panes: w.panes.clone() })
                    .collect();
                let spec = SessionSpec {
                    session_id: session.session.clone(),
                    project: session.session.clone(),
                    windows,
                    start_dir: None,
                    before_commands: Vec::new(),
                };
                info!(session_id = %session.session, "reconciliation: discovered new live session");
                registry.specs.insert(session.session.clone(), spec);
            }
        }

        let live: HashSet<String> = sessions.into_iter().map(|s| s.session).collect();

        let (to_start, orphans): (Vec<SessionSpec>, Vec<(String, ControllerHandle)>) = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let to_start = registry
                .specs
                .values()
                .filter(|spec| live.contains(&spec.session_id) && !registry.controllers.contains_key(&spec.session_id))
                .cloned()
                .collect();
            let orphans = registry
                .controllers
                .iter()
                .filter(|(id, _)| !live.contains(*id))
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect();
            (to_start, orphans)
        };

        for spec in to_start {
            match self.spawn_for_spec(&spec) {
                Ok(handle) => {
                    let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.controllers.insert(spec.session_id.clone(), handle.clone());
                    drop(registry);
                    if handle.start().await.is_ok() {
                        info!(session_id = %spec.session_id, "reconciliation: spawned controller for live session");
                    }
                }
                Err(e) => warn!(session_id = %spec.session_id, error = %e, "reconciliation: failed to spawn controller"),
            }
        }

        for (id, handle) in orphans {
            if matches!(handle.state(), ControllerState::Stopped) {
                let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.controllers.remove(&id);
                continue;
            }
            info!(session_id = %id, "reconciliation: underlying session gone, stopping orphaned controller");
            handle.stop_unconditionally().await;
        }
    }

    /// Run the reconciliation loop until `shutdown` fires.
    pub async fn run_reconciliation(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.reconcile_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => self.reconcile().await,
            }
        }
    }

    /// Process shutdown (§4.6): stop every controller, waiting up to
    /// `shutdown_grace` before returning regardless, then flush the learner
    /// unconditionally (§3 "Learning state persists across process
    /// restarts") before returning control to the caller. The background
    /// flush loop also flushes on its own cancellation token, but `main`
    /// cannot assume that detached task has won the race against process
    /// exit — awaiting the flush here is what actually makes it
    /// unconditional.
    pub async fn shutdown_all(&self) {
        let handles: Vec<ControllerHandle> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.controllers.values().cloned().collect()
        };
        let stop_all = async {
            for handle in &handles {
                handle.stop_unconditionally().await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_grace, stop_all).await.is_err() {
            warn!("supervisor shutdown: grace deadline elapsed before all controllers stopped");
        }
        self.responder.store().flush_now().await;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
