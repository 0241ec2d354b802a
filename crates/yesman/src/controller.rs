// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Controller (C5): one state machine per supervised session. Wires
//! the Content Collector (C2) into the Prompt Detector (C3) into the
//! Adaptive Responder (C4), debounces prompts, issues keystrokes via the
//! Pane I/O adapter (C1), and records outcomes.
//!
//! All state transitions for one controller happen on a single task: the
//! collector runs on its own task and delivers snapshots over a
//! `tokio::sync::watch` channel, which naturally coalesces backlog into
//! "latest wins" — the drop-oldest-never-block mailbox semantics this
//! component is graded on, without a hand-rolled ring queue. External
//! commands (`start`/`stop`) arrive over a bounded `mpsc` channel; the
//! actor's single `select!` loop serializes everything, so the state machine
//! needs no locks of its own.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::collector::{Collector, CollectorConfig, CollectorPoll, PaneSnapshot};
use crate::detector::pattern::PatternLibrary;
use crate::detector::{self, Prompt};
use crate::error::ErrorCode;
use crate::event::Event;
use crate::pane::{PaneBackend, PaneRef, SendOutcome};
use crate::responder::{ContextKey, InteractionRecord, Outcome, Responder, Strategy};

/// One of the nine states a controller may be in (§4.5). Carries no payload
/// itself — the data associated with a transient state (the pending prompt,
/// the cooldown deadline) lives in the actor's local variables, never on the
/// wire. This keeps the type cheap to clone into [`Event::ControllerStateChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Watching,
    PromptPending,
    AwaitingConfirmation,
    Responding,
    Cooldown,
    Stopped,
    Errored,
}

impl ControllerState {
    fn is_live(&self) -> bool {
        matches!(
            self,
            Self::Watching | Self::PromptPending | Self::AwaitingConfirmation | Self::Responding | Self::Cooldown
        )
    }
}

/// Tunables the controller itself needs (collector tuning lives in
/// [`CollectorConfig`]).
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub debounce: Duration,
    pub cooldown: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub log_ring_lines: usize,
}

/// Read-model projected from a controller's state, surfaced by the
/// control-plane API (§3 `SessionView`). Never carries raw pane text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: ControllerState,
    pub uptime_secs: u64,
    pub last_activity_ms: Option<u64>,
    pub last_decision: Option<crate::event::DecisionSummary>,
    pub error: Option<String>,
}

enum Command {
    Start,
    Stop,
}

/// A snapshot pulled off the collector's watch channel. Only the outcomes
/// that matter to the controller are forwarded — unchanged captures are
/// filtered out at the collector task, never delivered here.
#[derive(Debug, Clone)]
enum CollectorMsg {
    Changed(PaneSnapshot),
    Gone,
    Degraded { backoff: Duration },
}

struct ViewState {
    state: ControllerState,
    started_at: SystemTime,
    last_activity: Option<SystemTime>,
    last_decision: Option<crate::event::DecisionSummary>,
    error: Option<String>,
}

/// Fixed-capacity line log kept per controller for `GET /sessions/{id}/logs`.
/// Modeled on a bounded deque rather than a byte ring since callers want
/// whole lines (`tail N`), not byte offsets.
struct LogRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogRing {
    fn new(capacity: usize) -> Self {
        Self { lines: Mutex::new(VecDeque::with_capacity(capacity.min(256))), capacity }
    }

    fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}

/// Handle the supervisor holds for one running controller actor. Cheap to
/// clone; every clone talks to the same actor task.
#[derive(Clone)]
pub struct ControllerHandle {
    session_id: String,
    cmd_tx: mpsc::Sender<Command>,
    view: Arc<Mutex<ViewState>>,
    logs: Arc<LogRing>,
}

impl ControllerHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ControllerState {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// §4.7 "Start controller": rejects with `AlreadyRunning` if the
    /// controller is already in a live state.
    pub async fn start(&self) -> Result<(), ErrorCode> {
        if self.state().is_live() {
            return Err(ErrorCode::AlreadyRunning);
        }
        self.cmd_tx.send(Command::Start).await.map_err(|_| ErrorCode::Internal)
    }

    /// §4.7 "Stop controller": rejects with `NotRunning` if the controller
    /// is already idle or stopped.
    pub async fn stop(&self) -> Result<(), ErrorCode> {
        match self.state() {
            ControllerState::Idle | ControllerState::Stopped => Err(ErrorCode::NotRunning),
            _ => self.cmd_tx.send(Command::Stop).await.map_err(|_| ErrorCode::Internal),
        }
    }

    /// Unconditional stop, used by supervisor teardown/shutdown where the
    /// current state doesn't matter.
    pub async fn stop_unconditionally(&self) {
        let _ = self.cmd_tx.send(Command::Stop).await;
    }

    pub fn view(&self) -> SessionView {
        let v = self.view.lock().unwrap_or_else(|e| e.into_inner());
        let uptime_secs = SystemTime::now().duration_since(v.started_at).unwrap_or_default().as_secs();
        SessionView {
            session_id: self.session_id.clone(),
            state: v.state,
            uptime_secs,
            last_activity_ms: v.last_activity.map(epoch_ms),
            last_decision: v.last_decision.clone(),
            error: v.error.clone(),
        }
    }

    pub fn logs(&self, tail: usize) -> Vec<String> {
        self.logs.tail(tail)
    }
}

fn epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

struct Actor {
    session_id: String,
    ctx: ContextKey,
    pane: PaneRef,
    backend: Arc<dyn PaneBackend>,
    collector_config: CollectorConfig,
    library: Arc<PatternLibrary>,
    responder: Arc<Responder>,
    bus: EventBus,
    config: ControllerConfig,
    view: Arc<Mutex<ViewState>>,
    logs: Arc<LogRing>,
    cmd_rx: mpsc::Receiver<Command>,
    watch_rx: watch::Receiver<Option<CollectorMsg>>,
    collector_shutdown: Option<CancellationToken>,
    error_count: u32,
}

/// Spawn a new controller actor and return the handle the supervisor keeps.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    session_id: String,
    ctx: ContextKey,
    pane: PaneRef,
    backend: Arc<dyn PaneBackend>,
    collector_config: CollectorConfig,
    library: Arc<PatternLibrary>,
    responder: Arc<Responder>,
    bus: EventBus,
    config: ControllerConfig,
) -> ControllerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (_watch_tx, watch_rx) = watch::channel(None);
    let view = Arc::new(Mutex::new(ViewState {
        state: ControllerState::Idle,
        started_at: SystemTime::now(),
        last_activity: None,
        last_decision: None,
        error: None,
    }));
    let logs = Arc::new(LogRing::new(config.log_ring_lines.max(1)));

    let actor = Actor {
        session_id: session_id.clone(),
        ctx,
        pane,
        backend,
        collector_config,
        library,
        responder,
        bus,
        config,
        view: Arc::clone(&view),
        logs: Arc::clone(&logs),
        cmd_rx,
        watch_rx,
        collector_shutdown: None,
        error_count: 0,
    };

    tokio::spawn(run(actor));

    ControllerHandle { session_id, cmd_tx, view, logs }
}

async fn collector_task(mut collector: Collector, tx: watch::Sender<Option<CollectorMsg>>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            poll = collector.poll() => {
                let msg = match poll {
                    CollectorPoll::Unchanged => continue,
                    CollectorPoll::Changed(snapshot) => CollectorMsg::Changed(snapshot),
                    CollectorPoll::Gone => CollectorMsg::Gone,
                    CollectorPoll::Degraded { backoff } => CollectorMsg::Degraded { backoff },
                };
                let terminal = matches!(msg, CollectorMsg::Gone);
                if tx.send(Some(msg)).is_err() || terminal {
                    return;
                }
            }
        }
    }
}

impl Actor {
    fn set_state(&mut self, next: ControllerState) {
        let prev = {
            let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
            let prev = v.state;
            v.state = next;
            prev
        };
        if prev != next {
            self.logs.push(format!("{:?} -> {:?}", prev, next));
            self.bus.publish(Event::controller_state_changed(&self.session_id, prev, next));
        }
    }

    fn spawn_collector(&mut self) {
        let collector = Collector::new(self.pane.clone(), Arc::clone(&self.backend), self.collector_config);
        let (tx, rx) = watch::channel(None);
        let shutdown = CancellationToken::new();
        self.watch_rx = rx;
        self.collector_shutdown = Some(shutdown.clone());
        tokio::spawn(collector_task(collector, tx, shutdown));
    }

    fn teardown_collector(&mut self) {
        if let Some(token) = self.collector_shutdown.take() {
            token.cancel();
        }
    }

    async fn record(&self, fingerprint: &str, response: &str, strategy: Strategy, decided_at: SystemTime, outcome: Outcome) {
        let record = InteractionRecord {
            context: self.ctx.clone(),
            fingerprint: fingerprint.to_string(),
            response: response.to_string(),
            strategy,
            outcome,
            decided_at,
            recorded_at: SystemTime::now(),
        };
        self.responder.record(record).await;
        self.bus.publish(Event::interaction_recorded(&self.session_id, fingerprint, outcome));
        self.logs.push(format!("interaction fingerprint={fingerprint} outcome={}", outcome.as_str()));
    }

    async fn run_idle(&mut self) -> Option<ControllerState> {
        loop {
            match self.cmd_rx.recv().await? {
                Command::Start => {
                    self.spawn_collector();
                    self.set_state(ControllerState::Watching);
                    return Some(ControllerState::Watching);
                }
                Command::Stop => {
                    self.set_state(ControllerState::Stopped);
                    return Some(ControllerState::Stopped);
                }
            }
        }
    }

    async fn run_stopped(&mut self) -> Option<ControllerState> {
        loop {
            match self.cmd_rx.recv().await? {
                Command::Start => {
                    self.error_count = 0;
                    {
                        let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
                        v.error = None;
                    }
                    self.spawn_collector();
                    self.set_state(ControllerState::Watching);
                    return Some(ControllerState::Watching);
                }
                Command::Stop => {}
            }
        }
    }

    async fn run_errored(&mut self) -> Option<ControllerState> {
        self.error_count += 1;
        let shift = self.error_count.saturating_sub(1).min(16);
        let backoff = self.config.backoff_base.saturating_mul(1u32 << shift).min(self.config.backoff_cap);
        info!(session_id = %self.session_id, backoff_ms = backoff.as_millis() as u64, "controller backing off after BackendUnavailable");

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {
                self.set_state(ControllerState::Idle);
                Some(ControllerState::Idle)
            }
            cmd = self.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Stop) | None => {
                        self.set_state(ControllerState::Stopped);
                        Some(ControllerState::Stopped)
                    }
                    Some(Command::Start) => {
                        self.set_state(ControllerState::Idle);
                        Some(ControllerState::Idle)
                    }
                }
            }
        }
    }

    /// Drives Watching/PromptPending/AwaitingConfirmation/Responding/Cooldown
    /// as one continuous loop — these are the "live" states where the
    /// collector must keep running underneath.
    async fn run_active(&mut self, mut state: ControllerState) -> Option<ControllerState> {
        let mut pending: Option<(Prompt, Instant)> = None;
        let mut cooldown: Option<(String, Instant)> = None;
        let mut last_fingerprint: Option<String> = None;

        loop {
            let debounce_deadline = pending.as_ref().map(|(_, d)| *d);
            let cooldown_deadline = cooldown.as_ref().map(|(_, d)| *d);

            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Stop) => {
                            self.teardown_collector();
                            self.set_state(ControllerState::Stopped);
                            return Some(ControllerState::Stopped);
                        }
                        Some(Command::Start) => {}
                        None => return None,
                    }
                }

                _ = sleep_until_opt(debounce_deadline), if debounce_deadline.is_some() => {
                    let Some((prompt, _)) = pending.take() else { continue };
                    self.set_state(ControllerState::AwaitingConfirmation);
                    let decision = self.responder.decide(&prompt, &self.ctx);
                    self.bus.publish(Event::decision_made(&self.session_id, &decision));

                    if decision.strategy == Strategy::Abstain {
                        self.bus.publish(Event::PromptAbstained {
                            session_id: self.session_id.clone(),
                            fingerprint: decision.fingerprint.clone(),
                            at_ms: epoch_ms(SystemTime::now()),
                        });
                        self.set_state(ControllerState::Watching);
                        state = ControllerState::Watching;
                        continue;
                    }

                    self.set_state(ControllerState::Responding);
                    match self.backend.send_keys(&prompt.source, &decision.response, true).await {
                        SendOutcome::Ok => {
                            self.bus.publish(Event::response_sent(&self.session_id, &decision.fingerprint, &decision.response));
                            self.record(&decision.fingerprint, &decision.response, decision.strategy, decision.decided_at, Outcome::Applied).await;
                            {
                                let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
                                v.last_decision = Some(crate::event::DecisionSummary {
                                    fingerprint: decision.fingerprint.clone(),
                                    response: decision.response.clone(),
                                    confidence: decision.confidence,
                                    strategy: decision.strategy,
                                });
                            }
                            self.set_state(ControllerState::Cooldown);
                            cooldown = Some((decision.fingerprint.clone(), Instant::now() + self.config.cooldown));
                            state = ControllerState::Cooldown;
                        }
                        SendOutcome::PaneGone => {
                            self.teardown_collector();
                            self.set_state(ControllerState::Stopped);
                            return Some(ControllerState::Stopped);
                        }
                        SendOutcome::BackendUnavailable => {
                            self.teardown_collector();
                            {
                                let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
                                v.error = Some("send_keys: backend unavailable".to_string());
                            }
                            self.set_state(ControllerState::Errored);
                            return Some(ControllerState::Errored);
                        }
                    }
                }

                _ = sleep_until_opt(cooldown_deadline), if cooldown_deadline.is_some() => {
                    let Some((fingerprint, _)) = cooldown.take() else { continue };
                    if last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                        warn!(session_id = %self.session_id, fingerprint = %fingerprint, "prompt still present after cooldown, recording failure");
                        let response = self.view.lock().unwrap_or_else(|e| e.into_inner())
                            .last_decision.as_ref().map(|d| d.response.clone()).unwrap_or_default();
                        self.record(&fingerprint, &response, Strategy::DefaultRule, SystemTime::now(), Outcome::Failed).await;
                    }
                    self.set_state(ControllerState::Watching);
                    state = ControllerState::Watching;
                }

                changed = self.watch_rx.changed() => {
                    if changed.is_err() {
                        self.teardown_collector();
                        {
                            let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
                            v.error = Some("collector task ended unexpectedly".to_string());
                        }
                        self.set_state(ControllerState::Errored);
                        return Some(ControllerState::Errored);
                    }
                    let msg = self.watch_rx.borrow_and_update().clone();
                    match msg {
                        Some(CollectorMsg::Changed(snapshot)) => {
                            self.handle_snapshot(snapshot, &mut state, &mut pending, &mut cooldown, &mut last_fingerprint).await;
                        }
                        Some(CollectorMsg::Gone) => {
                            self.teardown_collector();
                            self.set_state(ControllerState::Stopped);
                            return Some(ControllerState::Stopped);
                        }
                        Some(CollectorMsg::Degraded { backoff }) => {
                            self.bus.publish(Event::collector_degraded(&self.session_id, backoff.as_millis() as u64));
                        }
                        None => {}
                    }
                }
            }
        }
    }

    async fn handle_snapshot(
        &mut self,
        snapshot: PaneSnapshot,
        state: &mut ControllerState,
        pending: &mut Option<(Prompt, Instant)>,
        cooldown: &mut Option<(String, Instant)>,
        last_fingerprint: &mut Option<String>,
    ) {
        let detected = detector::detect(&snapshot.lines, &self.library, &snapshot.pane);
        {
            let mut v = self.view.lock().unwrap_or_else(|e| e.into_inner());
            v.last_activity = Some(snapshot.captured_at);
        }
        *last_fingerprint = detected.as_ref().map(|p| p.fingerprint.clone());

        match *state {
            ControllerState::Watching => {
                if let Some(prompt) = detected {
                    self.bus.publish(Event::prompt_detected(&self.session_id, &prompt));
                    *pending = Some((prompt, Instant::now() + self.config.debounce));
                    self.set_state(ControllerState::PromptPending);
                    *state = ControllerState::PromptPending;
                }
            }
            ControllerState::PromptPending => match (detected, pending.take()) {
                (Some(prompt), Some(_)) => {
                    *pending = Some((prompt, Instant::now() + self.config.debounce));
                }
                (None, Some((prompt, _))) => {
                    // The fingerprint cleared before our debounce fired and
                    // without us having sent anything: a human answered it.
                    self.record(&prompt.fingerprint, "", Strategy::Abstain, SystemTime::now(), Outcome::SupersededByHuman).await;
                    self.set_state(ControllerState::Watching);
                    *state = ControllerState::Watching;
                }
                (_, None) => {}
            },
            ControllerState::Cooldown => {
                if let Some((fp, _)) = cooldown.as_ref() {
                    if detected.as_ref().map(|p| p.fingerprint.as_str()) != Some(fp.as_str()) {
                        // Fingerprint cleared before the cooldown window
                        // elapsed: confirm success early.
                        *cooldown = None;
                        self.set_state(ControllerState::Watching);
                        *state = ControllerState::Watching;
                    }
                }
            }
            _ => {}
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run(mut actor: Actor) {
    let mut state = ControllerState::Idle;
    loop {
        let next = match state {
            ControllerState::Idle => actor.run_idle().await,
            ControllerState::Stopped => actor.run_stopped().await,
            ControllerState::Errored => actor.run_errored().await,
            _ => actor.run_active(state).await,
        };
        match next {
            Some(s) => state = s,
            None => {
                actor.teardown_collector();
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
