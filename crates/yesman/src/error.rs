// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error kinds shared across the controller state machine and the
/// HTTP/WebSocket control-plane API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// C1: the pane multiplexer could not be reached. Retriable.
    BackendUnavailable,
    /// C1/C2: the pane no longer exists. Terminal for the controller, not an error to report upward.
    PaneGone,
    /// C3 startup: the on-disk pattern library failed to parse. Fatal.
    PatternLibraryInvalid,
    /// C4: the learner store's tail could not be recovered by truncation. Fatal.
    StoreCorrupted,
    /// C5: the controller mailbox overflowed. Recoverable; oldest snapshots are dropped.
    MailboxOverflow,
    /// C7: a client-supplied request failed validation.
    ValidationError,
    /// C8: a subscriber fell behind its queue depth and was dropped.
    SubscriberLagged,
    /// C7: no session exists with the given id.
    NotFound,
    /// C7: the requested transition conflicts with the controller's current state.
    Conflict,
    /// C7 "Start controller": the controller is already in a live state.
    AlreadyRunning,
    /// C7 "Stop controller": the controller is already idle or stopped.
    NotRunning,
    /// C7: caller supplied no or an invalid bearer token.
    Unauthorized,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BackendUnavailable => 503,
            Self::PaneGone => 410,
            Self::PatternLibraryInvalid => 500,
            Self::StoreCorrupted => 500,
            Self::MailboxOverflow => 503,
            Self::ValidationError => 400,
            Self::SubscriberLagged => 409,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::AlreadyRunning => 409,
            Self::NotRunning => 409,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::PaneGone => "PANE_GONE",
            Self::PatternLibraryInvalid => "PATTERN_LIBRARY_INVALID",
            Self::StoreCorrupted => "STORE_CORRUPTED",
            Self::MailboxOverflow => "MAILBOX_OVERFLOW",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::SubscriberLagged => "SUBSCRIBER_LAGGED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::NotRunning => "NOT_RUNNING",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process exit codes (§6): `0` clean shutdown, `1` configuration error,
/// `2` backend unavailable at startup, `3` unrecoverable store corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,
    ConfigError = 1,
    BackendUnavailable = 2,
    StoreCorrupted = 3,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
