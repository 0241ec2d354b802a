// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane I/O adapter (C1): the only part of the system that talks to a real
//! terminal multiplexer. Everything above this module works against the
//! [`PaneBackend`] trait so it can be driven deterministically in tests with
//! [`fake::FakeBackend`].

pub mod fake;
pub mod tmux;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Opaque address of a pane inside a terminal multiplexer. Lifetime is tied
/// to the underlying pane; it may become invalid between any two operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneRef {
    pub session: String,
    pub window: u32,
    pub pane: u32,
}

impl PaneRef {
    pub fn new(session: impl Into<String>, window: u32, pane: u32) -> Self {
        Self { session: session.into(), window, pane }
    }

    /// The `session:window.pane` target string tmux expects.
    pub fn target(&self) -> String {
        format!("{}:{}.{}", self.session, self.window, self.pane)
    }
}

impl fmt::Display for PaneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target())
    }
}

/// A window within a session, as seen by `enumerate()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub index: u32,
    pub panes: Vec<u32>,
}

/// A session, as seen by `enumerate()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session: String,
    pub windows: Vec<WindowInfo>,
}

/// Result of a `capture` call. `PaneGone` and `Unavailable` are both
/// recoverable results, not errors: the former means the multiplexer is
/// reachable but this particular pane no longer exists (terminal for the
/// owning controller); the latter means the multiplexer itself could not be
/// reached (retriable with backoff). The two are deliberately distinct so
/// the Content Collector (C2) can apply exponential backoff only to the
/// second case instead of tearing down the controller for a transient
/// connectivity blip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Text(String),
    PaneGone,
    Unavailable,
}

/// Result of a `sendKeys` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Ok,
    PaneGone,
    BackendUnavailable,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pane I/O adapter contract. All three operations are idempotent where
/// applicable; object-safe so callers can hold `Box<dyn PaneBackend>`. Methods
/// return boxed futures (rather than using `async fn`) so the trait stays
/// object-safe, the same tradeoff the reference codebase's PTY `Backend`
/// trait makes for its `run` method.
pub trait PaneBackend: Send + Sync + 'static {
    /// List every session/window/pane the backend currently knows about.
    /// Fails with `BackendUnavailable` if the multiplexer cannot be reached.
    fn enumerate(&self) -> BoxFuture<'_, anyhow::Result<Vec<SessionInfo>>>;

    /// Return the last `max_lines` of the pane's scrollback-and-screen
    /// concatenation.
    fn capture(&self, pane: &PaneRef, max_lines: usize) -> BoxFuture<'_, Capture>;

    /// Send `keys` to the pane, optionally followed by Enter.
    fn send_keys(&self, pane: &PaneRef, keys: &str, press_enter: bool) -> BoxFuture<'_, SendOutcome>;
}
