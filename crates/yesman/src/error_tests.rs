// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    backend_unavailable = { ErrorCode::BackendUnavailable, 503 },
    pane_gone = { ErrorCode::PaneGone, 410 },
    pattern_library_invalid = { ErrorCode::PatternLibraryInvalid, 500 },
    store_corrupted = { ErrorCode::StoreCorrupted, 500 },
    mailbox_overflow = { ErrorCode::MailboxOverflow, 503 },
    validation_error = { ErrorCode::ValidationError, 400 },
    subscriber_lagged = { ErrorCode::SubscriberLagged, 409 },
    not_found = { ErrorCode::NotFound, 404 },
    conflict = { ErrorCode::Conflict, 409 },
    already_running = { ErrorCode::AlreadyRunning, 409 },
    not_running = { ErrorCode::NotRunning, 409 },
    unauthorized = { ErrorCode::Unauthorized, 401 },
    internal = { ErrorCode::Internal, 500 },
)]
fn http_status(error_code: ErrorCode, expected: u16) {
    assert_eq!(error_code.http_status(), expected);
}

#[test]
fn display_matches_as_str() {
    assert_eq!(ErrorCode::PaneGone.to_string(), "PANE_GONE");
    assert_eq!(ErrorCode::SubscriberLagged.to_string(), "SUBSCRIBER_LAGGED");
}
