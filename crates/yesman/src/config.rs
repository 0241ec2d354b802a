// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Supervises interactive terminal sessions and auto-answers prompts.
#[derive(Debug, Parser, Clone)]
#[command(name = "yesman", version, about)]
pub struct Config {
    /// Host address to bind the control-plane API to.
    #[arg(long, env = "YESMAN_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on for the control-plane API.
    #[arg(long, env = "YESMAN_PORT", default_value = "8001")]
    pub port: u16,

    /// Bearer token for API authentication. No auth if unset.
    #[arg(long, env = "YESMAN_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// tmux socket to address (defaults to the user's default server).
    #[arg(long, env = "YESMAN_TMUX_SOCKET")]
    pub tmux_socket: Option<PathBuf>,

    /// Directory holding the on-disk pattern library. Falls back to the
    /// bundled default library when unset.
    #[arg(long, env = "YESMAN_PATTERN_DIR")]
    pub pattern_dir: Option<PathBuf>,

    /// Directory holding persisted per-project learner state.
    #[arg(long, env = "YESMAN_STORE_DIR", default_value = "./yesman-store")]
    pub store_dir: PathBuf,

    /// Base collector poll interval in milliseconds.
    #[arg(long, env = "YESMAN_POLL_INTERVAL_MS", default_value = "250")]
    pub poll_interval_ms: u64,

    /// Maximum adaptive collector poll interval in milliseconds.
    #[arg(long, env = "YESMAN_POLL_INTERVAL_MAX_MS", default_value = "2000")]
    pub poll_interval_max_ms: u64,

    /// Number of trailing lines inspected by the prompt detector.
    #[arg(long, env = "YESMAN_DETECT_LINES", default_value = "40")]
    pub detect_lines: usize,

    /// Debounce window in milliseconds before a pending prompt is decided.
    #[arg(long, env = "YESMAN_DEBOUNCE_MS", default_value = "400")]
    pub debounce_ms: u64,

    /// Cooldown window in milliseconds after a response is sent.
    #[arg(long, env = "YESMAN_COOLDOWN_MS", default_value = "1500")]
    pub cooldown_ms: u64,

    /// Base backend-unavailable backoff in milliseconds.
    #[arg(long, env = "YESMAN_BACKOFF_BASE_MS", default_value = "500")]
    pub backoff_base_ms: u64,

    /// Cap on backend-unavailable backoff in milliseconds.
    #[arg(long, env = "YESMAN_BACKOFF_CAP_MS", default_value = "30000")]
    pub backoff_cap_ms: u64,

    /// Confidence threshold (tau) a learned candidate must exceed.
    #[arg(long, env = "YESMAN_CONFIDENCE_TAU", default_value = "0.7")]
    pub confidence_tau: f64,

    /// Minimum margin (delta) over the runner-up candidate.
    #[arg(long, env = "YESMAN_CONFIDENCE_DELTA", default_value = "0.15")]
    pub confidence_delta: f64,

    /// Recency half-life for learner scoring, in days.
    #[arg(long, env = "YESMAN_HALF_LIFE_DAYS", default_value = "14")]
    pub half_life_days: f64,

    /// Maximum InteractionRecords retained per fingerprint.
    #[arg(long, env = "YESMAN_MAX_RECORDS_PER_FINGERPRINT", default_value = "500")]
    pub max_records_per_fingerprint: usize,

    /// Whether cross-project widening is consulted when project-scoped
    /// history is insufficient.
    #[arg(long, env = "YESMAN_CROSS_PROJECT_WIDENING", default_value = "true")]
    pub cross_project_widening: bool,

    /// Weight multiplier applied to cross-project records.
    #[arg(long, env = "YESMAN_CROSS_PROJECT_WEIGHT", default_value = "0.5")]
    pub cross_project_weight: f64,

    /// Reconciliation loop interval in seconds.
    #[arg(long, env = "YESMAN_RECONCILE_INTERVAL_SECS", default_value = "5")]
    pub reconcile_interval_secs: u64,

    /// Graceful shutdown deadline in seconds.
    #[arg(long, env = "YESMAN_SHUTDOWN_GRACE_SECS", default_value = "3")]
    pub shutdown_grace_secs: u64,

    /// Per-subscriber event bus queue depth.
    #[arg(long, env = "YESMAN_BUS_QUEUE_DEPTH", default_value = "256")]
    pub bus_queue_depth: usize,

    /// Log format (json or text).
    #[arg(long, env = "YESMAN_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "YESMAN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_tau) {
            anyhow::bail!("--confidence-tau must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.confidence_delta) {
            anyhow::bail!("--confidence-delta must be within [0, 1]");
        }
        if self.confidence_delta >= self.confidence_tau {
            anyhow::bail!("--confidence-delta must be less than --confidence-tau");
        }
        if self.half_life_days <= 0.0 {
            anyhow::bail!("--half-life-days must be positive");
        }
        if self.max_records_per_fingerprint == 0 {
            anyhow::bail!("--max-records-per-fingerprint must be at least 1");
        }
        if self.poll_interval_max_ms < self.poll_interval_ms {
            anyhow::bail!("--poll-interval-max-ms must be >= --poll-interval-ms");
        }
        if self.backoff_base_ms > self.backoff_cap_ms {
            anyhow::bail!("--backoff-base-ms must be <= --backoff-cap-ms");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_interval_max(&self) -> Duration {
        Duration::from_millis(self.poll_interval_max_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
