// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Learned-candidate scoring (§4.4 step 2): a pure function of the records
//! handed to it, a context, and the responder's configuration.

use std::collections::HashMap;
use std::time::SystemTime;

use super::store::LearnerStore;
use super::{ContextKey, InteractionRecord, Outcome, ResponderConfig};

/// Per-response accumulator used while scoring candidates.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    /// Recency-decayed weight of `Applied` observations.
    applied: f64,
    /// Recency-decayed weight of `Failed` observations.
    failed: f64,
}

impl Tally {
    /// Ranking score: applied weight minus `alpha` times failed weight.
    fn raw_score(&self, alpha: f64) -> f64 {
        self.applied - alpha * self.failed
    }

    /// Confidence: the recency-weighted hit rate among observations with a
    /// definite outcome. `SupersededByHuman`/`Unknown` never enter `Tally` in
    /// the first place (see [`fold_records`]), so they contribute neither
    /// credit nor penalty.
    fn confidence(&self) -> f64 {
        let total = self.applied + self.failed;
        if total <= 0.0 {
            0.0
        } else {
            (self.applied / total).clamp(0.0, 1.0)
        }
    }

    fn has_observations(&self) -> bool {
        self.applied + self.failed > 0.0
    }
}

/// `0.5 ^ (age_days / half_life_days)`; older records count for less.
fn recency_weight(recorded_at: SystemTime, now: SystemTime, half_life_days: f64) -> f64 {
    let age_secs = now.duration_since(recorded_at).map(|d| d.as_secs_f64()).unwrap_or(0.0);
    let age_days = age_secs / 86_400.0;
    0.5_f64.powf(age_days / half_life_days)
}

fn fold_records<'a>(
    records: impl Iterator<Item = &'a InteractionRecord>,
    now: SystemTime,
    config: &ResponderConfig,
    weight_multiplier: f64,
) -> HashMap<String, Tally> {
    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for record in records {
        let weight = recency_weight(record.recorded_at, now, config.half_life_days) * weight_multiplier;
        let tally = tallies.entry(record.response.clone()).or_default();
        match record.outcome {
            Outcome::Applied => tally.applied += weight,
            Outcome::Failed => tally.failed += weight,
            Outcome::SupersededByHuman | Outcome::Unknown => {}
        }
    }
    tallies
}

/// Pick the best candidate out of a set of tallies, applying the
/// threshold/margin rule: the top candidate must exceed `tau` confidence and
/// beat the runner-up by at least `delta`. Candidates with no observations
/// (pure zero weight) never compete.
fn best_candidate(tallies: &HashMap<String, Tally>, config: &ResponderConfig) -> Option<(String, f64)> {
    let mut ranked: Vec<(&String, &Tally)> =
        tallies.iter().filter(|(_, t)| t.has_observations()).collect();
    ranked.sort_by(|a, b| {
        b.1.raw_score(config.failure_weight)
            .partial_cmp(&a.1.raw_score(config.failure_weight))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let (top_response, top_tally) = ranked.first()?;
    let top_confidence = top_tally.confidence();
    if top_confidence < config.confidence_tau {
        return None;
    }
    if let Some((_, runner_up)) = ranked.get(1) {
        if top_confidence - runner_up.confidence() < config.confidence_delta {
            return None;
        }
    }
    Some((top_response.to_string(), top_confidence))
}

/// §4.4 step 2: widen the lookup scope — `(project, session)`, then
/// `project`, then (if enabled) globally with cross-project records
/// down-weighted — stopping at the first scope whose top candidate clears
/// the threshold/margin rule.
pub fn learned_candidate(
    store: &LearnerStore,
    fingerprint: &str,
    ctx: &ContextKey,
    config: &ResponderConfig,
    now: SystemTime,
) -> Option<(String, f64)> {
    let project_records = store.records_for_project(&ctx.project, fingerprint);

    let session_scoped = project_records.iter().filter(|r| r.context.session == ctx.session);
    if let Some(found) = best_candidate(&fold_records(session_scoped, now, config, 1.0), config) {
        return Some(found);
    }

    let project_scoped = project_records.iter();
    if let Some(found) = best_candidate(&fold_records(project_scoped, now, config, 1.0), config) {
        return Some(found);
    }

    if !config.cross_project_widening {
        return None;
    }

    let mut tallies = fold_records(project_records.iter(), now, config, 1.0);
    for (other_project, other_records) in store.records_for_fingerprint_excluding(fingerprint, &ctx.project) {
        let weighted = fold_records(other_records.iter(), now, config, config.cross_project_weight);
        for (response, tally) in weighted {
            let entry = tallies.entry(response).or_default();
            entry.applied += tally.applied;
            entry.failed += tally.failed;
        }
        let _ = other_project;
    }
    best_candidate(&tallies, config)
}
