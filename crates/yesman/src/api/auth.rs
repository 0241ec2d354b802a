// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::error::ErrorCode;

/// Constant-time string comparison to avoid leaking token length/prefix via
/// timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate a Bearer token from HTTP headers. `Ok(())` when `expected` is
/// `None` (auth disabled) or the header matches.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ErrorCode> {
    let Some(expected) = expected else { return Ok(()) };

    let header = headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or(ErrorCode::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(ErrorCode::Unauthorized)?;
    validate_bearer_token(Some(token), Some(expected))
}

/// Validate a bare token value (as carried on a WebSocket upgrade's
/// `?token=` query parameter, where no `Authorization` header is possible).
/// `Ok(())` when `expected` is `None` (auth disabled) or `token` matches.
pub fn validate_bearer_token(token: Option<&str>, expected: Option<&str>) -> Result<(), ErrorCode> {
    let Some(expected) = expected else { return Ok(()) };
    match token {
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        _ => Err(ErrorCode::Unauthorized),
    }
}

/// Enforce Bearer auth on every route except `/healthz` and the `/stream`
/// WebSocket upgrade (which authenticates via its own query token instead,
/// since browsers cannot set an `Authorization` header on a WS handshake).
pub async fn auth_layer(State(state): State<Arc<AppState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    let path = req.uri().path();
    if path == "/healthz" || path == "/stream" {
        return next.run(req).await;
    }

    if let Err(code) = validate_bearer(req.headers(), state.auth_token.as_deref()) {
        return code.to_http_response("unauthorized").into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
