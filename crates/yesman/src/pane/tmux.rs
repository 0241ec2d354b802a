// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`PaneBackend`] implementation: shells out to `tmux`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;

use super::{Capture, PaneBackend, PaneRef, SendOutcome, SessionInfo, WindowInfo};

/// Addresses panes of an already-running tmux server. Never creates
/// sessions, windows, or panes — enumeration only ever reports what already
/// exists.
pub struct TmuxBackend {
    socket: Option<PathBuf>,
}

impl TmuxBackend {
    pub fn new(socket: Option<PathBuf>) -> Self {
        Self { socket }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(ref s) = self.socket {
            cmd.arg("-S").arg(s);
        }
        cmd
    }
}

impl PaneBackend for TmuxBackend {
    fn enumerate(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<SessionInfo>>> + Send + '_>> {
        Box::pin(async move {
            let output = self
                .cmd()
                .args(["list-panes", "-a", "-F", "#{session_name}\t#{window_index}\t#{pane_index}"])
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .output()
                .await
                .map_err(|e| anyhow::anyhow!("failed to spawn tmux: {e}"))?;

            if !output.status.success() {
                anyhow::bail!("tmux list-panes failed");
            }

            let mut sessions: indexmap::IndexMap<String, indexmap::IndexMap<u32, Vec<u32>>> =
                indexmap::IndexMap::new();
            let text = String::from_utf8_lossy(&output.stdout);
            for line in text.lines() {
                let mut fields = line.split('\t');
                let (Some(session), Some(window), Some(pane)) =
                    (fields.next(), fields.next(), fields.next())
                else {
                    continue;
                };
                let Ok(window) = window.parse::<u32>() else { continue };
                let Ok(pane) = pane.parse::<u32>() else { continue };
                sessions
                    .entry(session.to_owned())
                    .or_default()
                    .entry(window)
                    .or_default()
                    .push(pane);
            }

            Ok(sessions
                .into_iter()
                .map(|(session, windows)| SessionInfo {
                    session,
                    windows: windows
                        .into_iter()
                        .map(|(index, panes)| WindowInfo { index, panes })
                        .collect(),
                })
                .collect())
        })
    }

    fn capture(&self, pane: &PaneRef, max_lines: usize) -> Pin<Box<dyn Future<Output = Capture> + Send + '_>> {
        let target = pane.target();
        Box::pin(async move {
            let start = format!("-{max_lines}");
            let output = self
                .cmd()
                .args(["capture-pane", "-p", "-e", "-t", &target, "-S", &start])
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .output()
                .await;

            match output {
                Ok(out) if out.status.success() => {
                    Capture::Text(String::from_utf8_lossy(&out.stdout).into_owned())
                }
                // tmux ran and rejected the target: the pane is gone, not the backend.
                Ok(_) => Capture::PaneGone,
                // Couldn't even spawn tmux: the backend itself is unreachable.
                Err(_) => Capture::Unavailable,
            }
        })
    }

    fn send_keys(&self, pane: &PaneRef, keys: &str, press_enter: bool) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + '_>> {
        let target = pane.target();
        let keys = keys.to_owned();
        Box::pin(async move {
            let status = self
                .cmd()
                .args(["send-keys", "-l", "-t", &target, &keys])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            match status {
                Ok(s) if s.success() => {}
                Ok(_) => return SendOutcome::PaneGone,
                Err(_) => return SendOutcome::BackendUnavailable,
            }

            if press_enter {
                let status = self
                    .cmd()
                    .args(["send-keys", "-t", &target, "Enter"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                match status {
                    Ok(s) if s.success() => {}
                    Ok(_) => return SendOutcome::PaneGone,
                    Err(_) => return SendOutcome::BackendUnavailable,
                }
            }

            SendOutcome::Ok
        })
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
