// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted [`PaneBackend`] used by deterministic tests throughout the crate.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use super::{Capture, PaneBackend, PaneRef, SendOutcome, SessionInfo, WindowInfo};

/// A backend whose captures are a pre-scripted queue of frames per pane and
/// whose `sendKeys` calls are recorded for assertions.
#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    sessions: Vec<SessionInfo>,
    captures: std::collections::HashMap<PaneRef, VecDeque<Capture>>,
    sent: Vec<(PaneRef, String, bool)>,
    unavailable: bool,
    send_keys_unavailable: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pane as part of one session/window for `enumerate()`.
    pub fn with_pane(self, pane: &PaneRef) -> Self {
        {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(session) = state.sessions.iter_mut().find(|s| s.session == pane.session) {
                if let Some(window) = session.windows.iter_mut().find(|w| w.index == pane.window) {
                    window.panes.push(pane.pane);
                } else {
                    session.windows.push(WindowInfo { index: pane.window, panes: vec![pane.pane] });
                }
            } else {
                state.sessions.push(SessionInfo {
                    session: pane.session.clone(),
                    windows: vec![WindowInfo { index: pane.window, panes: vec![pane.pane] }],
                });
            }
        }
        self
    }

    /// Queue up a sequence of captures to be returned in order for `pane`.
    pub fn push_captures(&self, pane: &PaneRef, frames: impl IntoIterator<Item = Capture>) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.captures.entry(pane.clone()).or_default().extend(frames);
    }

    pub fn push_text(&self, pane: &PaneRef, text: impl Into<String>) {
        self.push_captures(pane, [Capture::Text(text.into())]);
    }

    /// Mark the backend as currently unreachable; `enumerate` and `send_keys`
    /// will report `BackendUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).unavailable = unavailable;
    }

    /// Fail only `send_keys` with `BackendUnavailable`, leaving `capture`
    /// and `enumerate` healthy. Lets a test simulate a backend that can
    /// still be read from but has stopped accepting keystrokes.
    pub fn set_send_keys_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).send_keys_unavailable = unavailable;
    }

    /// Every `(pane, keys, press_enter)` triple sent so far, in order.
    pub fn sent(&self) -> Vec<(PaneRef, String, bool)> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sent.clone()
    }
}

impl PaneBackend for FakeBackend {
    fn enumerate(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SessionInfo>>> + Send + '_>> {
        Box::pin(async move {
            let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if state.unavailable {
                anyhow::bail!("fake backend unavailable");
            }
            Ok(state.sessions.clone())
        })
    }

    fn capture(&self, pane: &PaneRef, _max_lines: usize) -> Pin<Box<dyn Future<Output = Capture> + Send + '_>> {
        let pane = pane.clone();
        Box::pin(async move {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if state.unavailable {
                return Capture::Unavailable;
            }
            match state.captures.get_mut(&pane).and_then(|q| q.pop_front()) {
                Some(capture) => capture,
                None => Capture::Text(String::new()),
            }
        })
    }

    fn send_keys(&self, pane: &PaneRef, keys: &str, press_enter: bool) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + '_>> {
        let pane = pane.clone();
        let keys = keys.to_owned();
        Box::pin(async move {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if state.unavailable || state.send_keys_unavailable {
                return SendOutcome::BackendUnavailable;
            }
            state.sent.push((pane, keys, press_enter));
            SendOutcome::Ok
        })
    }
}
