// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level event types published on the [`crate::bus::EventBus`] (C8) and
//! consumed by the control-plane stream (C7) and logs. Every
//! [`crate::controller::ControllerState`] transition, detected prompt,
//! decision, and recorded outcome is represented here as a serializable,
//! tagged variant — never as an untyped blob.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::controller::ControllerState;
use crate::responder::{Outcome, Strategy};

fn epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// A classified prompt, shaped for the wire (no raw pane text — §3 says the
/// read-model never carries raw snapshot text, only metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSummary {
    pub kind: crate::detector::PromptKind,
    pub fingerprint: String,
    pub option_count: usize,
}

/// A [`crate::responder::Decision`], shaped for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub fingerprint: String,
    pub response: String,
    pub confidence: f64,
    pub strategy: Strategy,
}

/// Every event kind the supervisor publishes (§4.8). Internally tagged so
/// the wire shape is `{"kind": "...", ...fields}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    ControllerStateChanged { session_id: String, prev: ControllerState, next: ControllerState, at_ms: u64 },
    PromptDetected { session_id: String, prompt: PromptSummary, at_ms: u64 },
    DecisionMade { session_id: String, decision: DecisionSummary, at_ms: u64 },
    ResponseSent { session_id: String, fingerprint: String, response: String, at_ms: u64 },
    PromptAbstained { session_id: String, fingerprint: String, at_ms: u64 },
    InteractionRecorded { session_id: String, fingerprint: String, outcome: Outcome, at_ms: u64 },
    CollectorDegraded { session_id: String, backoff_ms: u64, at_ms: u64 },
    SubscriberLagged { subscriber_id: u64, at_ms: u64 },
}

impl Event {
    pub fn controller_state_changed(session_id: impl Into<String>, prev: ControllerState, next: ControllerState) -> Self {
        Self::ControllerStateChanged { session_id: session_id.into(), prev, next, at_ms: epoch_ms(SystemTime::now()) }
    }

    pub fn prompt_detected(session_id: impl Into<String>, prompt: &crate::detector::Prompt) -> Self {
        Self::PromptDetected {
            session_id: session_id.into(),
            prompt: PromptSummary { kind: prompt.kind, fingerprint: prompt.fingerprint.clone(), option_count: prompt.options.len() },
            at_ms: epoch_ms(SystemTime::now()),
        }
    }

    pub fn decision_made(session_id: impl Into<String>, decision: &crate::responder::Decision) -> Self {
        Self::DecisionMade {
            session_id: session_id.into(),
            decision: DecisionSummary {
                fingerprint: decision.fingerprint.clone(),
                response: decision.response.clone(),
                confidence: decision.confidence,
                strategy: decision.strategy,
            },
            at_ms: epoch_ms(SystemTime::now()),
        }
    }

    pub fn response_sent(session_id: impl Into<String>, fingerprint: impl Into<String>, response: impl Into<String>) -> Self {
        Self::ResponseSent {
            session_id: session_id.into(),
            fingerprint: fingerprint.into(),
            response: response.into(),
            at_ms: epoch_ms(SystemTime::now()),
        }
    }

    pub fn interaction_recorded(session_id: impl Into<String>, fingerprint: impl Into<String>, outcome: Outcome) -> Self {
        Self::InteractionRecorded {
            session_id: session_id.into(),
            fingerprint: fingerprint.into(),
            outcome,
            at_ms: epoch_ms(SystemTime::now()),
        }
    }

    pub fn collector_degraded(session_id: impl Into<String>, backoff_ms: u64) -> Self {
        Self::CollectorDegraded { session_id: session_id.into(), backoff_ms, at_ms: epoch_ms(SystemTime::now()) }
    }

    pub fn subscriber_lagged(subscriber_id: u64) -> Self {
        Self::SubscriberLagged { subscriber_id, at_ms: epoch_ms(SystemTime::now()) }
    }

    /// The session id this event concerns, if any (`SubscriberLagged` has
    /// none — it is about the bus itself, not a session).
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::ControllerStateChanged { session_id, .. }
            | Self::PromptDetected { session_id, .. }
            | Self::DecisionMade { session_id, .. }
            | Self::ResponseSent { session_id, .. }
            | Self::InteractionRecorded { session_id, .. }
            | Self::CollectorDegraded { session_id, .. } => Some(session_id),
            Self::PromptAbstained { session_id, .. } => Some(session_id),
            Self::SubscriberLagged { .. } => None,
        }
    }

    /// The kind tag this event serializes under (`#[serde(tag = "kind")]`'s
    /// `snake_case` variant name), used by the control-plane stream envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ControllerStateChanged { .. } => "controller_state_changed",
            Self::PromptDetected { .. } => "prompt_detected",
            Self::DecisionMade { .. } => "decision_made",
            Self::ResponseSent { .. } => "response_sent",
            Self::PromptAbstained { .. } => "prompt_abstained",
            Self::InteractionRecorded { .. } => "interaction_recorded",
            Self::CollectorDegraded { .. } => "collector_degraded",
            Self::SubscriberLagged { .. } => "subscriber_lagged",
        }
    }

    pub fn at_ms(&self) -> u64 {
        match self {
            Self::ControllerStateChanged { at_ms, .. }
            | Self::PromptDetected { at_ms, .. }
            | Self::DecisionMade { at_ms, .. }
            | Self::ResponseSent { at_ms, .. }
            | Self::PromptAbstained { at_ms, .. }
            | Self::InteractionRecorded { at_ms, .. }
            | Self::CollectorDegraded { at_ms, .. }
            | Self::SubscriberLagged { at_ms, .. } => *at_ms,
        }
    }
}
