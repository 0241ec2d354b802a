// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt Detector (C3): maps a text snapshot to zero or one [`Prompt`].
//!
//! Patterns are data, loaded from a pattern directory at startup by
//! [`pattern::PatternLibrary`] — this module contains no hardcoded dialog
//! tables. Detection itself is a pure function of (normalized snapshot,
//! loaded library): no state beyond the library.

pub mod extract;
pub mod fingerprint;
pub mod normalize;
pub mod pattern;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::pane::PaneRef;
use pattern::PatternLibrary;

/// The classified shape of a detected prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    YesNo,
    NumberedSelection,
    BinarySelection,
    TrustWorkspace,
    Continuation,
    Login,
    Unknown,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YesNo => "yes_no",
            Self::NumberedSelection => "numbered",
            Self::BinarySelection => "binary",
            Self::TrustWorkspace => "trust_workspace",
            Self::Continuation => "continuation",
            Self::Login => "login",
            Self::Unknown => "unknown",
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "yes_no" => Some(Self::YesNo),
            "numbered" => Some(Self::NumberedSelection),
            "binary" => Some(Self::BinarySelection),
            "trust_workspace" => Some(Self::TrustWorkspace),
            "continuation" => Some(Self::Continuation),
            "login" => Some(Self::Login),
            _ => None,
        }
    }
}

/// A detected prompt: classification, raw text, extracted options, and a
/// stable fingerprint for learning/cooldown purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub raw_text: String,
    pub options: Vec<String>,
    pub fingerprint: String,
    pub detected_at: SystemTime,
    pub source: PaneRef,
}

/// Classifies a pane snapshot's trailing lines against a loaded pattern
/// library. Pure: same (lines, library) always yields the same result.
pub fn detect(lines: &[String], library: &PatternLibrary, source: &PaneRef) -> Option<Prompt> {
    let window = &lines[lines.len().saturating_sub(library.window_lines())..];
    let joined = window.join("\n");
    let normalized = normalize::normalize_for_matching(&joined);

    let matched = library.patterns().iter().find(|p| p.matches(&normalized))?;

    let options = extract::extract_options(matched.kind, matched.option_rule, window);
    let skeleton = normalize::skeleton(&normalized, &options);
    let fp = fingerprint::fingerprint(matched.kind, &skeleton, options.len());

    Some(Prompt {
        kind: matched.kind,
        raw_text: joined,
        options,
        fingerprint: fp,
        detected_at: SystemTime::now(),
        source: source.clone(),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
