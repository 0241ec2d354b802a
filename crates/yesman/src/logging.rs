// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing/logging initialization, split out of `main.rs` so it can be
//! called from integration tests too.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize the global tracing subscriber from `config`. Uses `try_init`
/// so it is safe to call more than once (tests call this per-process, not
/// per-test, but a second call is harmless either way).
///
/// Priority: `RUST_LOG` if set, otherwise `--log-level`/`YESMAN_LOG_LEVEL`.
pub fn init(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}
