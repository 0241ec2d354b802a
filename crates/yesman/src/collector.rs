// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content Collector (C2): for one pane, produce a lazy, bounded-rate
//! sequence of [`PaneSnapshot`] deltas. Unchanged captures are dropped at
//! the source (never delivered downstream, only counted); [`PaneGone`] ends
//! the sequence normally; [`Unavailable`] pauses the collector with
//! exponential backoff and is reported to the caller so it can publish
//! `CollectorDegraded`.
//!
//! [`PaneGone`]: crate::pane::Capture::PaneGone
//! [`Unavailable`]: crate::pane::Capture::Unavailable

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::pane::{Capture, PaneBackend, PaneRef};

/// Number of consecutive unchanged captures before the poll interval doubles.
const UNCHANGED_DOUBLE_THRESHOLD: u32 = 3;

/// A point-in-time capture of a pane's trailing text, deduped against the
/// previous capture and stamped with a strictly monotonic per-pane sequence
/// number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSnapshot {
    pub pane: PaneRef,
    pub seq: u64,
    pub captured_at: SystemTime,
    pub lines: Vec<String>,
    pub hash: u64,
}

/// What one [`Collector::poll`] call produced.
#[derive(Debug, Clone)]
pub enum CollectorPoll {
    /// A new, distinct snapshot.
    Changed(PaneSnapshot),
    /// The capture was identical to the last one; nothing delivered.
    Unchanged,
    /// The pane no longer exists. Terminal for this collector.
    Gone,
    /// The backend itself could not be reached; paused for `backoff`.
    Degraded { backoff: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub max_lines: usize,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

/// Per-pane poll loop. Not `Send + Sync` by design — one collector belongs
/// to exactly one controller mailbox loop.
pub struct Collector {
    pane: PaneRef,
    backend: Arc<dyn PaneBackend>,
    config: CollectorConfig,
    interval: Duration,
    current_backoff: Option<Duration>,
    seq: u64,
    last_hash: Option<u64>,
    consecutive_unchanged: u32,
}

fn hash_lines(lines: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for line in lines {
        line.hash(&mut hasher);
        hasher.write_u8(0);
    }
    hasher.finish()
}

impl Collector {
    pub fn new(pane: PaneRef, backend: Arc<dyn PaneBackend>, config: CollectorConfig) -> Self {
        let interval = config.base_interval;
        Self { pane, backend, config, interval, current_backoff: None, seq: 0, last_hash: None, consecutive_unchanged: 0 }
    }

    pub fn pane(&self) -> &PaneRef {
        &self.pane
    }

    /// Sleep the current interval (or backoff, if degraded) and capture
    /// once, updating internal adaptive state.
    pub async fn poll(&mut self) -> CollectorPoll {
        let sleep_for = self.current_backoff.unwrap_or(self.interval);
        tokio::time::sleep(sleep_for).await;

        match self.backend.capture(&self.pane, self.config.max_lines).await {
            Capture::PaneGone => CollectorPoll::Gone,
            Capture::Unavailable => {
                let next = match self.current_backoff {
                    None => self.config.backoff_base,
                    Some(b) => (b * 2).min(self.config.backoff_cap),
                };
                self.current_backoff = Some(next);
                CollectorPoll::Degraded { backoff: next }
            }
            Capture::Text(text) => {
                self.current_backoff = None;
                let lines: Vec<String> = text.lines().map(str::to_owned).collect();
                let hash = hash_lines(&lines);

                if self.last_hash == Some(hash) {
                    self.consecutive_unchanged += 1;
                    if self.consecutive_unchanged % UNCHANGED_DOUBLE_THRESHOLD == 0 {
                        self.interval = (self.interval * 2).min(self.config.max_interval);
                    }
                    return CollectorPoll::Unchanged;
                }

                self.last_hash = Some(hash);
                self.consecutive_unchanged = 0;
                self.interval = self.config.base_interval;
                self.seq += 1;
                CollectorPoll::Changed(PaneSnapshot { pane: self.pane.clone(), seq: self.seq, captured_at: SystemTime::now(), lines, hash })
            }
        }
    }
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
