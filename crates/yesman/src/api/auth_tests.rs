// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;

use super::{validate_bearer, validate_bearer_token};
use crate::error::ErrorCode;

#[yare::parameterized(
    no_token_allows_all = { None, None, true },
    valid_bearer        = { Some("secret123"), Some("Bearer secret123"), true },
    invalid_bearer      = { Some("secret123"), Some("Bearer wrong"), false },
    missing_header      = { Some("secret123"), None, false },
    wrong_scheme        = { Some("secret123"), Some("Basic dXNlcjpwYXNz"), false },
)]
fn bearer_header_validation(expected_token: Option<&str>, header_value: Option<&str>, should_pass: bool) {
    let mut headers = HeaderMap::new();
    if let Some(val) = header_value {
        headers.insert("authorization", val.parse().expect("header value"));
    }
    let result = validate_bearer(&headers, expected_token);
    if should_pass {
        assert!(result.is_ok(), "expected Ok, got {result:?}");
    } else {
        assert_eq!(result, Err(ErrorCode::Unauthorized));
    }
}

#[yare::parameterized(
    no_expected   = { Some("anything"), None, true },
    valid_token   = { Some("secret123"), Some("secret123"), true },
    invalid_token = { Some("wrong"), Some("secret123"), false },
    missing_token = { None, Some("secret123"), false },
)]
fn bearer_query_token_validation(token: Option<&str>, expected: Option<&str>, should_pass: bool) {
    let result = validate_bearer_token(token, expected);
    if should_pass {
        assert!(result.is_ok(), "expected Ok, got {result:?}");
    } else {
        assert_eq!(result, Err(ErrorCode::Unauthorized));
    }
}
